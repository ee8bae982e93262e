//! GeoIP lookup using MaxMind GeoLite2/GeoIP2 MMDB files.

use anyhow::{Context, Result};
use maxminddb::{geoip2, Mmap, Reader};
use std::net::IpAddr;
use std::sync::Arc;

/// Geo attributes extracted for one visit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoInfo {
    /// ISO country code (e.g., "US", "GB")
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
}

/// Thread-safe, memory-mapped City database reader.
#[derive(Clone)]
pub struct GeoIpService {
    reader: Arc<Reader<Mmap>>,
}

impl GeoIpService {
    pub fn new(city_path: &str) -> Result<Self> {
        let reader = unsafe { Reader::open_mmap(city_path) }
            .with_context(|| format!("Failed to open GeoIP City database at {}", city_path))?;
        Ok(Self {
            reader: Arc::new(reader),
        })
    }

    /// Lookup geo attributes for an IP. Unknown addresses return an empty
    /// `GeoInfo`; the routing engine treats those fields as absent.
    pub fn lookup(&self, ip: IpAddr) -> GeoInfo {
        let mut geo = GeoInfo::default();

        if let Ok(result) = self.reader.lookup(ip) {
            if let Ok(Some(city)) = result.decode::<geoip2::City>() {
                geo.country = city.country.iso_code.map(|s| s.to_string());
                if let Some(subdivision) = city.subdivisions.first() {
                    geo.region = subdivision.names.english.map(|s| s.to_string());
                }
                geo.city = city.city.names.english.map(|s| s.to_string());
            } else if let Ok(Some(country)) = result.decode::<geoip2::Country>() {
                // Country-only databases still answer the most common
                // routing condition.
                geo.country = country.country.iso_code.map(|s| s.to_string());
            }
        }

        geo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geoip_service_creation_invalid_path() {
        assert!(GeoIpService::new("/nonexistent/path.mmdb").is_err());
    }
}
