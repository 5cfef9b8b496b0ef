use super::geo::Coordinates;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Vendor {
    pub id: String,
    pub business_name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Service radius in kilometres. Falls back to the system radius.
    #[serde(default)]
    pub service_radius_km: Option<f64>,
    pub active: bool,
}

impl Vendor {
    pub fn coordinates(&self) -> Option<Coordinates> {
        Coordinates::from_parts(self.latitude, self.longitude)
    }

    /// The radius this vendor actually serves, capped by the system radius.
    pub fn effective_radius_km(&self, system_radius_km: f64) -> f64 {
        self.service_radius_km
            .unwrap_or(system_radius_km)
            .min(system_radius_km)
    }

    pub fn pickup_text(&self) -> String {
        match &self.address {
            Some(address) => format!("{}, {}", self.business_name, address),
            None => self.business_name.clone(),
        }
    }
}

/// A vendor that can serve the customer, with its distance to them.
#[derive(Debug, Clone, PartialEq)]
pub struct EligibleVendor {
    pub vendor: Vendor,
    pub distance_km: f64,
}

/// Returns the vendors able to serve `customer`, nearest first.
///
/// Equal distances are ordered by vendor id so repeated runs pick the same
/// winner.
pub fn eligible_vendors(
    customer: Coordinates,
    roster: &[Vendor],
    system_radius_km: f64,
) -> Vec<EligibleVendor> {
    let mut eligible: Vec<EligibleVendor> = roster
        .iter()
        .filter(|vendor| vendor.active)
        .filter_map(|vendor| {
            let location = vendor.coordinates()?;
            let distance_km = customer.distance_km(&location);
            (distance_km <= vendor.effective_radius_km(system_radius_km)).then(|| EligibleVendor {
                vendor: vendor.clone(),
                distance_km,
            })
        })
        .collect();

    eligible.sort_by(|a, b| {
        a.distance_km
            .total_cmp(&b.distance_km)
            .then_with(|| a.vendor.id.cmp(&b.vendor.id))
    });
    eligible
}
