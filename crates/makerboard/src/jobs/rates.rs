use serde::{Deserialize, Serialize};

use crate::jobs::model::JobCategory;

/// Machines and services with a fixed base price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceType {
    #[serde(rename = "BAMBU_X1C")]
    BambuX1c,
    #[serde(rename = "H2D")]
    H2d,
    #[serde(rename = "LASER")]
    Laser,
}

#[derive(Debug, Clone, Serialize)]
pub struct StandardRate {
    pub service_type: ServiceType,
    pub name: &'static str,
    pub category: JobCategory,
    pub base_rate_cents: i64,
    pub currency: &'static str,
}

impl ServiceType {
    pub const ALL: [ServiceType; 3] = [ServiceType::BambuX1c, ServiceType::H2d, ServiceType::Laser];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::BambuX1c => "BAMBU_X1C",
            ServiceType::H2d => "H2D",
            ServiceType::Laser => "LASER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "BAMBU_X1C" => Some(ServiceType::BambuX1c),
            "H2D" => Some(ServiceType::H2d),
            "LASER" => Some(ServiceType::Laser),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServiceType::BambuX1c => "Bambu Lab X1 Carbon",
            ServiceType::H2d => "Bambu Lab H2D",
            ServiceType::Laser => "Laser Cutting",
        }
    }

    pub fn base_rate_cents(&self) -> i64 {
        match self {
            ServiceType::BambuX1c => 500,
            ServiceType::H2d => 700,
            ServiceType::Laser => 2000,
        }
    }

    /// The only category a standard-rate job for this service can be posted under.
    pub fn category(&self) -> JobCategory {
        match self {
            ServiceType::BambuX1c | ServiceType::H2d => JobCategory::ThreeDPrinting,
            ServiceType::Laser => JobCategory::LaserCutting,
        }
    }

    pub fn rate(&self) -> StandardRate {
        StandardRate {
            service_type: *self,
            name: self.name(),
            category: self.category(),
            base_rate_cents: self.base_rate_cents(),
            currency: crate::jobs::terms::CURRENCY,
        }
    }
}

pub fn standard_rates() -> Vec<StandardRate> {
    ServiceType::ALL.iter().map(ServiceType::rate).collect()
}
