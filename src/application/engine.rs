use super::dispatcher::{DispatchOutcome, Dispatcher};
use super::settlement::{SettlementOutcome, SettlementService};
use crate::config::EngineConfig;
use crate::domain::ports::{
    NotifierRef, OrderStore, OrderStoreRef, SettingsSource, SettingsSourceRef, VendorDirectory,
    VendorDirectoryRef, WalletStore, WalletStoreRef,
};
use crate::error::Result;
use rust_decimal::Decimal;
use std::sync::Arc;

/// A validated request to run one of the engine's operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    Dispatch { order_id: String },
    Settle { order_id: String, delivered_amount: Decimal },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Dispatch(DispatchOutcome),
    Settlement(SettlementOutcome),
}

/// The collaborators both operations are wired to.
#[derive(Clone)]
pub struct Collaborators {
    pub orders: OrderStoreRef,
    pub vendors: VendorDirectoryRef,
    pub settings: SettingsSourceRef,
    pub wallets: WalletStoreRef,
    pub notifier: NotifierRef,
}

impl Collaborators {
    /// Wires every port to a single store that implements all of them.
    pub fn from_store<S>(store: Arc<S>, notifier: NotifierRef) -> Self
    where
        S: OrderStore + VendorDirectory + SettingsSource + WalletStore + 'static,
    {
        Self {
            orders: store.clone(),
            vendors: store.clone(),
            settings: store.clone(),
            wallets: store,
            notifier,
        }
    }
}

/// Entry point that routes triggers to the dispatcher or the settlement
/// service.
pub struct OrderEngine {
    dispatcher: Dispatcher,
    settlement: SettlementService,
}

impl OrderEngine {
    pub fn new(collaborators: Collaborators, config: EngineConfig) -> Self {
        let Collaborators {
            orders,
            vendors,
            settings,
            wallets,
            notifier,
        } = collaborators;

        Self {
            dispatcher: Dispatcher::new(
                orders.clone(),
                vendors,
                settings.clone(),
                notifier.clone(),
                config.clone(),
            ),
            settlement: SettlementService::new(orders, wallets, settings, notifier, config),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn settlement(&self) -> &SettlementService {
        &self.settlement
    }

    pub async fn handle(&self, trigger: Trigger) -> Result<Outcome> {
        match trigger {
            Trigger::Dispatch { order_id } => self
                .dispatcher
                .dispatch(&order_id)
                .await
                .map(Outcome::Dispatch),
            Trigger::Settle {
                order_id,
                delivered_amount,
            } => self
                .settlement
                .settle(&order_id, delivered_amount)
                .await
                .map(Outcome::Settlement),
        }
    }
}
