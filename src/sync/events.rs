//! Event system for sale synchronization.
//!
//! The sync loop emits a `SaleEvent` after every refresh attempt and every optimistic
//! update. Registered handlers observe these events without being able to alter the
//! published snapshot, which stays owned by the loop.

use super::types::{SaleSnapshot, SyncError};
use crate::chain::Commitment;
use crate::sale::{PaymentUnits, SaleError};
use crate::utils::format_token_amount;

use std::sync::Arc;
use tracing::{error, info};

/// Events that occur during sale synchronization
pub enum SaleEvent {
	/// A refresh completed and its snapshot was published
	ViewRefreshed { snapshot: Arc<SaleSnapshot> },
	/// A refresh failed; the previous snapshot stays published
	RefreshFailed {
		commitment: Commitment,
		error: SaleError,
	},
	/// A local delta was published on top of the last snapshot
	OptimisticApplied { snapshot: Arc<SaleSnapshot> },
}

/// Trait for handling sale events.
#[async_trait::async_trait]
pub trait SaleEventHandler: Send + Sync {
	async fn handle(&mut self, event: &SaleEvent) -> Result<(), SyncError>;

	/// Get the name of this handler for logging and diagnostics.
	fn name(&self) -> &'static str;
}

/// Event dispatcher that manages multiple event handlers.
#[derive(Default)]
pub struct EventDispatcher {
	handlers: Vec<Box<dyn SaleEventHandler>>,
}

impl EventDispatcher {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a new event handler.
	///
	/// Handlers are called in the order they are registered.
	pub fn register_handler(&mut self, handler: Box<dyn SaleEventHandler>) {
		self.handlers.push(handler);
	}

	pub fn handler_count(&self) -> usize {
		self.handlers.len()
	}

	/// Dispatch an event to all registered handlers.
	///
	/// Errors from handlers are logged, but do not stop other handlers from running.
	pub async fn dispatch(&mut self, event: &SaleEvent) {
		for handler in &mut self.handlers {
			if let Err(e) = handler.handle(event).await {
				error!("Handler {} failed to process event: {}", handler.name(), e);
			}
		}
	}
}

/// Logs every published view in a human-readable line
pub struct ViewLogger {
	units: PaymentUnits,
}

impl ViewLogger {
	pub fn new(units: PaymentUnits) -> Self {
		Self { units }
	}

	fn describe(&self, snapshot: &SaleSnapshot) -> String {
		let view = &snapshot.view;
		let decimals = match snapshot.config.token_mint {
			Some(_) => self.units.token_decimals,
			None => self.units.native_decimals,
		};
		let state = if view.is_sold_out {
			"sold out"
		} else if view.is_ended {
			"ended"
		} else if view.is_active {
			"active"
		} else if view.is_presale {
			"presale"
		} else {
			"not started"
		};
		format!(
			"{} | {}/{} remaining | price {} {}{}",
			state,
			view.items_remaining,
			view.items_cap,
			format_token_amount(view.price, decimals),
			view.price_label,
			if snapshot.optimistic {
				" (pending confirmation)"
			} else {
				""
			}
		)
	}
}

#[async_trait::async_trait]
impl SaleEventHandler for ViewLogger {
	async fn handle(&mut self, event: &SaleEvent) -> Result<(), SyncError> {
		match event {
			SaleEvent::ViewRefreshed { snapshot } | SaleEvent::OptimisticApplied { snapshot } => {
				info!("Sale {}: {}", snapshot.config.address, self.describe(snapshot));
			}
			SaleEvent::RefreshFailed { commitment, error } => {
				error!("Refresh at {} failed: {}", commitment, error);
			}
		}
		Ok(())
	}

	fn name(&self) -> &'static str {
		"view-logger"
	}
}
