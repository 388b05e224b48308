//!
//! On-chain layout of the sale account and the derived addresses around it.
//!
//! The sale account is Borsh encoded behind an 8 byte discriminator. Only the leading
//! configuration is decoded; the config lines that follow are ignored.

use super::types::*;

use borsh::BorshDeserialize;
#[cfg(test)]
use borsh::BorshSerialize;
use solana_sdk::pubkey::Pubkey;

/// Program owning the sale accounts
pub const CANDY_MACHINE_PROGRAM: Pubkey =
	solana_sdk::pubkey!("cndy3Z4yapfJBmL3ShUp5exZKqR3z33thTzeNMm2gRZ");
/// Token metadata program
pub const TOKEN_METADATA_PROGRAM: Pubkey =
	solana_sdk::pubkey!("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s");
/// SPL token program
pub const TOKEN_PROGRAM: Pubkey =
	solana_sdk::pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
/// Associated token account program
pub const ASSOCIATED_TOKEN_PROGRAM: Pubkey =
	solana_sdk::pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

const DISCRIMINATOR_LEN: usize = 8;

#[derive(BorshDeserialize)]
#[cfg_attr(test, derive(BorshSerialize))]
#[allow(dead_code)]
struct RawCandyMachine {
	authority: [u8; 32],
	wallet: [u8; 32],
	token_mint: Option<[u8; 32]>,
	items_redeemed: u64,
	data: RawCandyMachineData,
}

#[derive(BorshDeserialize)]
#[cfg_attr(test, derive(BorshSerialize))]
#[allow(dead_code)]
struct RawCandyMachineData {
	uuid: String,
	price: u64,
	symbol: String,
	seller_fee_basis_points: u16,
	max_supply: u64,
	is_mutable: bool,
	retain_authority: bool,
	go_live_date: Option<i64>,
	end_settings: Option<RawEndSettings>,
	creators: Vec<RawCreator>,
	hidden_settings: Option<RawHiddenSettings>,
	whitelist_mint_settings: Option<RawWhitelistMintSettings>,
	items_available: u64,
	gatekeeper: Option<RawGatekeeperConfig>,
}

#[derive(BorshDeserialize)]
#[cfg_attr(test, derive(BorshSerialize))]
enum RawEndSettingType {
	Date,
	Amount,
}

#[derive(BorshDeserialize)]
#[cfg_attr(test, derive(BorshSerialize))]
struct RawEndSettings {
	end_setting_type: RawEndSettingType,
	number: u64,
}

#[derive(BorshDeserialize)]
#[cfg_attr(test, derive(BorshSerialize))]
#[allow(dead_code)]
struct RawCreator {
	address: [u8; 32],
	verified: bool,
	share: u8,
}

#[derive(BorshDeserialize)]
#[cfg_attr(test, derive(BorshSerialize))]
#[allow(dead_code)]
struct RawHiddenSettings {
	name: String,
	uri: String,
	hash: [u8; 32],
}

#[derive(BorshDeserialize)]
#[cfg_attr(test, derive(BorshSerialize))]
enum RawWhitelistMintMode {
	BurnEveryTime,
	NeverBurn,
}

#[derive(BorshDeserialize)]
#[cfg_attr(test, derive(BorshSerialize))]
struct RawWhitelistMintSettings {
	mode: RawWhitelistMintMode,
	mint: [u8; 32],
	presale: bool,
	discount_price: Option<u64>,
}

#[derive(BorshDeserialize)]
#[cfg_attr(test, derive(BorshSerialize))]
struct RawGatekeeperConfig {
	gatekeeper_network: [u8; 32],
	expire_on_use: bool,
}

/// Decode a sale account's data into a `SaleConfig`
pub fn decode_sale_account(address: Pubkey, data: &[u8]) -> Result<SaleConfig, SaleError> {
	if data.len() < DISCRIMINATOR_LEN {
		return Err(SaleError::InvalidAccount(format!(
			"account {} holds {} bytes, shorter than the discriminator",
			address,
			data.len()
		)));
	}

	let mut body = &data[DISCRIMINATOR_LEN..];
	let raw = RawCandyMachine::deserialize(&mut body).map_err(|e| {
		SaleError::InvalidAccount(format!("Failed to decode sale account {}: {}", address, e))
	})?;

	if raw.items_redeemed > raw.data.items_available {
		return Err(SaleError::InvalidAccount(format!(
			"items redeemed ({}) exceeds items available ({})",
			raw.items_redeemed, raw.data.items_available
		)));
	}

	let end_setting = raw.data.end_settings.map(|end| match end.end_setting_type {
		RawEndSettingType::Date => EndSetting::Date(end.number as i64),
		RawEndSettingType::Amount => EndSetting::Amount(end.number),
	});

	let whitelist = raw.data.whitelist_mint_settings.map(|wl| WhitelistSettings {
		mint: Pubkey::new_from_array(wl.mint),
		mode: match wl.mode {
			RawWhitelistMintMode::BurnEveryTime => WhitelistMode::BurnEveryTime,
			RawWhitelistMintMode::NeverBurn => WhitelistMode::NeverBurn,
		},
		discount_price: wl.discount_price,
		presale: wl.presale,
	});

	let gatekeeper = raw.data.gatekeeper.map(|gk| GatekeeperSettings {
		network: Pubkey::new_from_array(gk.gatekeeper_network),
		expire_on_use: gk.expire_on_use,
	});

	Ok(SaleConfig {
		address,
		authority: Pubkey::new_from_array(raw.authority),
		treasury: Pubkey::new_from_array(raw.wallet),
		items_available: raw.data.items_available,
		items_redeemed: raw.items_redeemed,
		price: raw.data.price,
		symbol: raw.data.symbol.trim_end_matches('\0').to_string(),
		go_live_date: raw.data.go_live_date,
		end_setting,
		whitelist,
		gatekeeper,
		token_mint: raw.token_mint.map(Pubkey::new_from_array),
		retain_authority: raw.data.retain_authority,
	})
}

/// Collection marker PDA of a sale
pub fn collection_address(sale: &Pubkey) -> Pubkey {
	Pubkey::find_program_address(&[b"collection", sale.as_ref()], &CANDY_MACHINE_PROGRAM).0
}

/// Metadata account of a minted token
pub fn metadata_address(mint: &Pubkey) -> Pubkey {
	Pubkey::find_program_address(
		&[b"metadata", TOKEN_METADATA_PROGRAM.as_ref(), mint.as_ref()],
		&TOKEN_METADATA_PROGRAM,
	)
	.0
}

/// Associated token account of `wallet` for `mint`
pub fn associated_token_address(wallet: &Pubkey, mint: &Pubkey) -> Pubkey {
	Pubkey::find_program_address(
		&[wallet.as_ref(), TOKEN_PROGRAM.as_ref(), mint.as_ref()],
		&ASSOCIATED_TOKEN_PROGRAM,
	)
	.0
}

/// Encode a config the way the program lays it out, for tests that need account bytes
#[cfg(test)]
pub fn encode_sale_account(config: &SaleConfig) -> Vec<u8> {
	let raw = RawCandyMachine {
		authority: config.authority.to_bytes(),
		wallet: config.treasury.to_bytes(),
		token_mint: config.token_mint.map(|m| m.to_bytes()),
		items_redeemed: config.items_redeemed,
		data: RawCandyMachineData {
			uuid: "ABC123".to_string(),
			price: config.price,
			symbol: config.symbol.clone(),
			seller_fee_basis_points: 500,
			max_supply: 0,
			is_mutable: true,
			retain_authority: config.retain_authority,
			go_live_date: config.go_live_date,
			end_settings: config.end_setting.map(|end| match end {
				EndSetting::Date(ts) => RawEndSettings {
					end_setting_type: RawEndSettingType::Date,
					number: ts as u64,
				},
				EndSetting::Amount(n) => RawEndSettings {
					end_setting_type: RawEndSettingType::Amount,
					number: n,
				},
			}),
			creators: vec![RawCreator {
				address: config.authority.to_bytes(),
				verified: true,
				share: 100,
			}],
			hidden_settings: None,
			whitelist_mint_settings: config.whitelist.as_ref().map(|wl| RawWhitelistMintSettings {
				mode: match wl.mode {
					WhitelistMode::BurnEveryTime => RawWhitelistMintMode::BurnEveryTime,
					WhitelistMode::NeverBurn => RawWhitelistMintMode::NeverBurn,
				},
				mint: wl.mint.to_bytes(),
				presale: wl.presale,
				discount_price: wl.discount_price,
			}),
			items_available: config.items_available,
			gatekeeper: config.gatekeeper.as_ref().map(|gk| RawGatekeeperConfig {
				gatekeeper_network: gk.network.to_bytes(),
				expire_on_use: gk.expire_on_use,
			}),
		},
	};

	let mut data = vec![0u8; DISCRIMINATOR_LEN];
	raw.serialize(&mut data)
		.expect("serializing into a Vec cannot fail");
	// trailing config lines
	data.extend_from_slice(&[0xAB; 64]);
	data
}
