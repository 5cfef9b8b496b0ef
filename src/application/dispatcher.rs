use super::deadline::{notify_quietly, within};
use crate::config::EngineConfig;
use crate::domain::notification::{Notification, NotificationKind, Priority, Role};
use crate::domain::order::{
    Delivery, DeliveryStatus, DispatchAssignment, Order, OrderStatus, UnfulfillableReason,
};
use crate::domain::ports::{NotifierRef, OrderStoreRef, SettingsSourceRef, VendorDirectoryRef};
use crate::domain::settings::{AssignmentMode, EngineSettings};
use crate::domain::vendor::{EligibleVendor, eligible_vendors};
use crate::error::{EngineError, Result};
use chrono::Utc;
use rand::Rng;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Assigned {
        vendor_id: String,
        distance_km: f64,
        delivery_id: String,
    },
    Unfulfillable {
        reason: UnfulfillableReason,
    },
    /// Assignment mode is `multi`; an operator assigns vendors by hand.
    ManualAssignment,
    /// The order had already left `placed`, possibly through a concurrent run.
    AlreadyHandled {
        status: OrderStatus,
    },
}

/// Assigns a placed order to the nearest vendor that serves its address.
pub struct Dispatcher {
    orders: OrderStoreRef,
    vendors: VendorDirectoryRef,
    settings: SettingsSourceRef,
    notifier: NotifierRef,
    config: EngineConfig,
}

impl Dispatcher {
    pub fn new(
        orders: OrderStoreRef,
        vendors: VendorDirectoryRef,
        settings: SettingsSourceRef,
        notifier: NotifierRef,
        config: EngineConfig,
    ) -> Self {
        Self {
            orders,
            vendors,
            settings,
            notifier,
            config,
        }
    }

    /// Dispatches one order.
    ///
    /// Safe to call repeatedly: an order that is no longer `placed` is left
    /// untouched and reported as `AlreadyHandled`.
    #[instrument(skip_all, fields(order_id = %order_id))]
    pub async fn dispatch(&self, order_id: &str) -> Result<DispatchOutcome> {
        if order_id.trim().is_empty() {
            return Err(EngineError::InvalidInput("order_id is required".to_string()));
        }
        let limit = self.config.io_timeout;

        let order = within(limit, "order store", self.orders.get_order(order_id))
            .await?
            .ok_or_else(|| EngineError::not_found("order", order_id))?;
        if order.status != OrderStatus::Placed {
            info!(status = %order.status, "order is not placed, skipping dispatch");
            return Ok(DispatchOutcome::AlreadyHandled {
                status: order.status,
            });
        }

        let rows = within(limit, "settings", self.settings.settings()).await?;
        let settings = EngineSettings::from_rows(&rows)?;
        if settings.assignment_mode == AssignmentMode::Multi {
            info!("assignment mode is multi, leaving order for manual assignment");
            return Ok(DispatchOutcome::ManualAssignment);
        }

        let address = within(limit, "order store", self.orders.get_address(&order.address_id))
            .await?
            .ok_or_else(|| EngineError::not_found("address", &order.address_id))?;
        let Some(customer) = address.coordinates() else {
            return self
                .mark_unfulfillable(&order, UnfulfillableReason::MissingCoordinates)
                .await;
        };

        let roster = within(limit, "vendor directory", self.vendors.active_vendors()).await?;
        if roster.is_empty() {
            return self
                .mark_unfulfillable(&order, UnfulfillableReason::NoVendors)
                .await;
        }

        let eligible = eligible_vendors(customer, &roster, settings.service_radius_km);
        let Some(winner) = eligible.into_iter().next() else {
            return self
                .mark_unfulfillable(&order, UnfulfillableReason::NoVendorsInRadius)
                .await;
        };

        let items = within(limit, "order store", self.orders.order_items(&order.id)).await?;
        if items.is_empty() {
            warn!("order has no items");
        }

        let delivery = Delivery {
            id: Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            vendor_id: winner.vendor.id.clone(),
            pickup_address: winner.vendor.pickup_text(),
            delivery_address: address.formatted(),
            otp: generate_delivery_otp(),
            status: DeliveryStatus::Assigned,
            created_at: Utc::now(),
        };
        let delivery_id = delivery.id.clone();
        let assignment = DispatchAssignment::new(delivery, &items);

        if !within(limit, "order store", self.orders.commit_dispatch(assignment)).await? {
            return self.lost_race(&order.id).await;
        }

        info!(
            vendor_id = %winner.vendor.id,
            distance_km = winner.distance_km,
            delivery_id = %delivery_id,
            items = items.len(),
            "order assigned"
        );
        self.notify_vendor(&order, &winner, &delivery_id).await;

        Ok(DispatchOutcome::Assigned {
            vendor_id: winner.vendor.id,
            distance_km: winner.distance_km,
            delivery_id,
        })
    }

    async fn mark_unfulfillable(
        &self,
        order: &Order,
        reason: UnfulfillableReason,
    ) -> Result<DispatchOutcome> {
        let limit = self.config.io_timeout;
        if !within(limit, "order store", self.orders.mark_unfulfillable(&order.id)).await? {
            return self.lost_race(&order.id).await;
        }

        warn!(reason = %reason, "order marked unfulfillable");
        let notification = Notification {
            user_id: self.config.operator_id.clone(),
            role: Some(Role::Admin),
            kind: NotificationKind::OrderUnfulfillable,
            title: "Order cannot be fulfilled".to_string(),
            message: format!("Order {}: {}", order.id, reason.describe()),
            priority: Priority::High,
            entity_id: order.id.clone(),
            data: json!({
                "order_id": order.id,
                "customer_id": order.customer_id,
                "reason": reason.as_str(),
            }),
        };
        notify_quietly(self.notifier.as_ref(), limit, notification).await;

        Ok(DispatchOutcome::Unfulfillable { reason })
    }

    /// Another invocation moved the order first.
    async fn lost_race(&self, order_id: &str) -> Result<DispatchOutcome> {
        let order = within(
            self.config.io_timeout,
            "order store",
            self.orders.get_order(order_id),
        )
        .await?
        .ok_or_else(|| EngineError::not_found("order", order_id))?;
        info!(status = %order.status, "order was transitioned concurrently");
        Ok(DispatchOutcome::AlreadyHandled {
            status: order.status,
        })
    }

    async fn notify_vendor(&self, order: &Order, winner: &EligibleVendor, delivery_id: &str) {
        let notification = Notification {
            user_id: winner.vendor.id.clone(),
            role: Some(Role::Vendor),
            kind: NotificationKind::OrderAssigned,
            title: "New order assigned".to_string(),
            message: format!(
                "Order {} has been assigned to {}",
                order.id, winner.vendor.business_name
            ),
            priority: Priority::Normal,
            entity_id: order.id.clone(),
            data: json!({
                "order_id": order.id,
                "delivery_id": delivery_id,
                "distance_km": winner.distance_km,
            }),
        };
        notify_quietly(self.notifier.as_ref(), self.config.io_timeout, notification).await;
    }
}

/// Six-digit numeric code the customer hands to the courier.
pub fn generate_delivery_otp() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}
