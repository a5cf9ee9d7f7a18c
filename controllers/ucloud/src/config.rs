//! Controller configuration.
//!
//! `ControllerConfig` is read once from the environment in `main`.
//! `RegionTable` holds the per-region lookup tables (zones, default image,
//! elastic IP operator); it is built from the defaults below, optionally
//! extended by a YAML file, and shared read-only by every reconciliation.

use crate::error::ControllerError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use ucloud_client::{Credential, DEFAULT_BASE_URL, RequestContext};

/// Default VPC CIDR when the cluster does not declare one
pub const DEFAULT_VPC_CIDR: &str = "10.0.0.0/8";
/// Default subnet CIDR when the cluster does not declare one
pub const DEFAULT_SUBNET_CIDR: &str = "10.0.0.0/16";
/// Elastic IP bandwidth (Mbps) when unspecified
pub const DEFAULT_EIP_BANDWIDTH: i32 = 10;
/// vCPUs of a machine that does not set `cpu`
pub const DEFAULT_UHOST_CPU: i32 = 4;
/// Memory (MB) of a machine that does not set `memory`
pub const DEFAULT_UHOST_MEMORY: i32 = 8192;
/// Root disk (GB)
pub const DEFAULT_ROOT_DISK_SIZE: i32 = 40;
/// Data disk (GB)
pub const DEFAULT_DATA_DISK_SIZE: i32 = 40;
/// Port the API server load balancer listens on
pub const API_SERVER_PORT: i32 = 6443;

const SINGLE_ZONE_REGIONS: &[&str] = &[
    "tw-tp", "tw-tp2", "tw-kh", "jpn-tky", "kr-seoul", "th-bkk", "sg", "idn-jakarta", "vn-sng",
    "us-ca", "us-ws", "rus-mosc", "ge-fra", "uk-london", "ind-mumbai", "uae-dubai",
    "bra-saopaulo", "afr-nigeria",
];

/// Per-region lookup tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionTable {
    zones: BTreeMap<String, Vec<String>>,
    images: BTreeMap<String, String>,
    default_image: String,
    eip_operators: BTreeMap<String, String>,
}

/// On-disk form of a region table override. Entries extend the defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RegionTableFile {
    zones: BTreeMap<String, Vec<String>>,
    images: BTreeMap<String, String>,
    default_image: Option<String>,
    eip_operators: BTreeMap<String, String>,
}

impl Default for RegionTable {
    fn default() -> Self {
        let mut zones: BTreeMap<String, Vec<String>> = [
            ("cn-bj1", vec!["cn-bj1-01"]),
            ("cn-bj2", vec!["cn-bj2-02", "cn-bj2-03", "cn-bj2-04", "cn-bj2-05"]),
            ("cn-sh", vec!["cn-sh-02", "cn-sh-03"]),
            ("cn-sh2", vec!["cn-sh2-02", "cn-sh2-03"]),
            ("cn-gd", vec!["cn-gd-02"]),
            ("cn-gd2", vec!["cn-gd2-01"]),
            ("hk", vec!["hk-01", "hk-02"]),
        ]
        .into_iter()
        .map(|(region, zones)| (region.to_string(), zones.into_iter().map(String::from).collect()))
        .collect();
        for region in SINGLE_ZONE_REGIONS {
            zones.insert((*region).to_string(), vec![format!("{region}-01")]);
        }

        Self {
            zones,
            images: BTreeMap::from([("cn-bj2".to_string(), "uimage-kdwczn".to_string())]),
            default_image: "uimage-svsu4odz".to_string(),
            eip_operators: BTreeMap::new(),
        }
    }
}

impl RegionTable {
    /// Built-in tables extended by a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self, ControllerError> {
        let file: RegionTableFile = serde_yaml::from_str(yaml)
            .map_err(|e| ControllerError::InvalidConfig(format!("invalid region table: {e}")))?;
        let mut table = Self::default();
        table.zones.extend(file.zones);
        table.images.extend(file.images);
        table.eip_operators.extend(file.eip_operators);
        if let Some(image) = file.default_image {
            table.default_image = image;
        }
        Ok(table)
    }

    /// Zones of `region`
    pub fn zones(&self, region: &str) -> Result<&[String], ControllerError> {
        self.zones
            .get(region)
            .map(Vec::as_slice)
            .ok_or_else(|| ControllerError::UnsupportedRegion(region.to_string()))
    }

    /// Default image of `region`
    pub fn image(&self, region: &str) -> Result<&str, ControllerError> {
        self.zones(region)?;
        let image = self.images.get(region).map_or(self.default_image.as_str(), String::as_str);
        if image.is_empty() {
            return Err(ControllerError::NoImageForRegion(region.to_string()));
        }
        Ok(image)
    }

    /// Elastic IP line of `region`: `Bgp` in mainland regions, `International` elsewhere
    pub fn eip_operator(&self, region: &str) -> Result<&str, ControllerError> {
        self.zones(region)?;
        if let Some(operator) = self.eip_operators.get(region) {
            return Ok(operator);
        }
        Ok(if region.starts_with("cn-") { "Bgp" } else { "International" })
    }
}

/// Process configuration read from the environment
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// API endpoint
    pub base_url: String,
    /// Key pair used to sign requests
    pub credential: Credential,
    /// Namespace to watch, all namespaces when `None`
    pub namespace: Option<String>,
    /// Optional region table override
    pub region_table_path: Option<PathBuf>,
    /// Region and project used to validate the credential at startup
    pub probe: Option<RequestContext>,
}

impl ControllerConfig {
    /// Read the configuration from process environment variables
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| {
                ControllerError::InvalidConfig(format!("{key} environment variable is required"))
            })
        };

        let credential = Credential {
            public_key: required("UCLOUD_ACCESS_PUBKEY")?,
            private_key: required("UCLOUD_ACCESS_PRIKEY")?,
        };
        let probe = match (get("UCLOUD_REGION"), get("UCLOUD_PROJECT_ID")) {
            (Some(region), Some(project)) => Some(RequestContext::new(region, project)),
            _ => None,
        };

        Ok(Self {
            base_url: get("UCLOUD_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            credential,
            namespace: get("WATCH_NAMESPACE"),
            region_table_path: get("UCLOUD_REGION_TABLE").map(PathBuf::from),
            probe,
        })
    }

    /// Built-in region table, extended from `region_table_path` when set
    pub fn load_region_table(&self) -> Result<RegionTable, ControllerError> {
        match &self.region_table_path {
            Some(path) => {
                let yaml = std::fs::read_to_string(path).map_err(|e| {
                    ControllerError::InvalidConfig(format!("cannot read region table {}: {e}", path.display()))
                })?;
                RegionTable::from_yaml(&yaml)
            }
            None => Ok(RegionTable::default()),
        }
    }
}
