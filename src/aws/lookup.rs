//! Read-only lookups the graph needs before it can be built.
//!
//! Availability zones and the latest machine image are facts about the
//! account and region, so they are resolved up front rather than declared.

use super::cli;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;

/// Error type for lookups. `Send + Sync` so lookups can run on the blocking pool.
pub type LookupError = Box<dyn Error + Send + Sync>;

/// Source of region facts.
pub trait Lookup: Send + Sync {
    /// Names of the available zones in `region`, in provider order.
    fn availability_zones(&self, region: &str) -> Result<Vec<String>, LookupError>;

    /// Id of the most recently published image matching `filter`.
    ///
    /// Always "latest matching": repeated runs may resolve a newer image.
    fn latest_image(&self, region: &str, filter: &ImageFilter) -> Result<String, LookupError>;
}

/// Machine image selection criteria.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageFilter {
    pub owners: Vec<String>,
    pub architecture: String,
    pub name_pattern: String,
}

impl Default for ImageFilter {
    fn default() -> Self {
        ImageFilter {
            owners: vec!["amazon".to_string()],
            architecture: "x86_64".to_string(),
            name_pattern: "al2023-ami-2023*".to_string(),
        }
    }
}

impl ImageFilter {
    /// Stable key for caching lookups made with this filter.
    pub fn cache_key(&self, region: &str) -> String {
        format!(
            "{region}|{}|{}|{}",
            self.owners.join(","),
            self.architecture,
            self.name_pattern
        )
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct ZonesResponse {
    availability_zones: Vec<Zone>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct Zone {
    zone_name: String,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct ImagesResponse {
    images: Vec<Image>,
}

/// Subset of an image description returned by `describe-images`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Image {
    pub image_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub creation_date: String,
}

impl Image {
    fn created(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.creation_date).ok()
    }
}

/// Pick the most recently created image. Images with an unparsable
/// creation date lose against any image with a valid one.
pub fn most_recent(images: &[Image]) -> Option<&Image> {
    images
        .iter()
        .max_by_key(|image| (image.created(), image.creation_date.clone()))
}

fn parse_json<'a, T: Deserialize<'a>>(json: &'a str, what: &str) -> Result<T, LookupError> {
    let mut deserializer = serde_json::Deserializer::from_str(json);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
        log::error!("OUTPUT START:\n\n{}\n\nOUTPUT END\n", json);
        LookupError::from(format!(
            "Error parsing {what}: path={} error={}",
            e.path(),
            e
        ))
    })
}

/// Zone names from `describe-availability-zones` output, skipping zones that
/// are not `available`.
pub fn parse_zones(json: &str) -> Result<Vec<String>, LookupError> {
    let response: ZonesResponse = parse_json(json, "availability zones")?;
    Ok(response
        .availability_zones
        .into_iter()
        .filter(|z| z.state.as_deref().map_or(true, |s| s == "available"))
        .map(|z| z.zone_name)
        .collect())
}

/// Images from `describe-images` output.
pub fn parse_images(json: &str) -> Result<Vec<Image>, LookupError> {
    let response: ImagesResponse = parse_json(json, "images")?;
    Ok(response.images)
}

/// Lookups through the installed `aws` CLI. Credentials are whatever the CLI
/// resolves on its own.
#[derive(Debug, Clone)]
pub struct AwsCliLookup {
    program: String,
}

impl Default for AwsCliLookup {
    fn default() -> Self {
        AwsCliLookup {
            program: "aws".to_string(),
        }
    }
}

impl AwsCliLookup {
    fn zones_command(&self, region: &str) -> String {
        format!(
            "{} ec2 describe-availability-zones --region {region} --filters Name=state,Values=available --output json",
            self.program
        )
    }

    fn images_command(&self, region: &str, filter: &ImageFilter) -> String {
        format!(
            "{} ec2 describe-images --region {region} --owners {} --filters Name=architecture,Values={} Name=name,Values={} --output json",
            self.program,
            filter.owners.join(" "),
            filter.architecture,
            filter.name_pattern
        )
    }
}

impl Lookup for AwsCliLookup {
    fn availability_zones(&self, region: &str) -> Result<Vec<String>, LookupError> {
        let output = cli::run(&self.zones_command(region))?;
        let zones = parse_zones(&output)?;
        log::info!("{region}: {} available zones {:?}", zones.len(), zones);
        Ok(zones)
    }

    fn latest_image(&self, region: &str, filter: &ImageFilter) -> Result<String, LookupError> {
        let output = cli::run(&self.images_command(region, filter))?;
        let images = parse_images(&output)?;
        let image = most_recent(&images).ok_or_else(|| {
            format!(
                "No image in {region} matches {} ({})",
                filter.name_pattern, filter.architecture
            )
        })?;
        log::info!(
            "{region}: latest image {} {} created {} (of {} candidates)",
            image.image_id,
            image.name.as_deref().unwrap_or("-"),
            image.creation_date,
            images.len()
        );
        Ok(image.image_id.clone())
    }
}

/// Fixed lookups for offline planning and tests.
///
/// Regions without explicit entries get zones `<region>a`, `<region>b`,
/// `<region>c` and a placeholder image id.
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    zones: HashMap<String, Vec<String>>,
    images: HashMap<String, String>,
}

impl StaticLookup {
    pub fn new() -> StaticLookup {
        StaticLookup::default()
    }

    pub fn with_zones(mut self, region: &str, zones: &[&str]) -> StaticLookup {
        self.zones.insert(
            region.to_string(),
            zones.iter().map(|z| z.to_string()).collect(),
        );
        self
    }

    pub fn with_image(mut self, region: &str, image: &str) -> StaticLookup {
        self.images.insert(region.to_string(), image.to_string());
        self
    }
}

impl Lookup for StaticLookup {
    fn availability_zones(&self, region: &str) -> Result<Vec<String>, LookupError> {
        if let Some(zones) = self.zones.get(region) {
            return Ok(zones.clone());
        }
        Ok(vec![
            format!("{region}a"),
            format!("{region}b"),
            format!("{region}c"),
        ])
    }

    fn latest_image(&self, region: &str, _filter: &ImageFilter) -> Result<String, LookupError> {
        Ok(self
            .images
            .get(region)
            .cloned()
            .unwrap_or_else(|| format!("ami-offline-{region}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZONES_JSON: &str = r#"{
        "AvailabilityZones": [
            {"State": "available", "ZoneName": "us-east-1a", "ZoneId": "use1-az6"},
            {"State": "impaired", "ZoneName": "us-east-1b", "ZoneId": "use1-az1"},
            {"State": "available", "ZoneName": "us-east-1c", "ZoneId": "use1-az2"}
        ]
    }"#;

    const IMAGES_JSON: &str = r#"{
        "Images": [
            {"ImageId": "ami-old", "Name": "al2023-ami-2023.1.20230705.0-kernel-6.1-x86_64", "CreationDate": "2023-07-05T20:10:00.000Z"},
            {"ImageId": "ami-new", "Name": "al2023-ami-2023.6.20241010.0-kernel-6.1-x86_64", "CreationDate": "2024-10-10T18:02:11.000Z"},
            {"ImageId": "ami-mid", "Name": "al2023-ami-2023.4.20240401.1-kernel-6.1-x86_64", "CreationDate": "2024-04-01T09:00:00.000Z"}
        ]
    }"#;

    #[test]
    fn test_parse_zones_skips_unavailable() {
        let zones = parse_zones(ZONES_JSON).unwrap();
        assert_eq!(zones, vec!["us-east-1a", "us-east-1c"]);
    }

    #[test]
    fn test_parse_zones_reports_path() {
        let json = r#"{"AvailabilityZones": [{"State": "available"}]}"#;
        let err = parse_zones(json).unwrap_err();
        assert!(err.to_string().contains("AvailabilityZones[0]"), "{err}");
    }

    #[test]
    fn test_most_recent_image() {
        let images = parse_images(IMAGES_JSON).unwrap();
        assert_eq!(most_recent(&images).unwrap().image_id, "ami-new");
        assert!(most_recent(&[]).is_none());
    }

    #[test]
    fn test_most_recent_prefers_parsable_dates() {
        let images = vec![
            Image {
                image_id: "ami-broken".to_string(),
                name: None,
                creation_date: "not-a-date".to_string(),
            },
            Image {
                image_id: "ami-ok".to_string(),
                name: None,
                creation_date: "2020-01-01T00:00:00.000Z".to_string(),
            },
        ];
        assert_eq!(most_recent(&images).unwrap().image_id, "ami-ok");
    }

    #[test]
    fn test_images_command() {
        let filter = ImageFilter::default();
        let cmd = AwsCliLookup::default().images_command("eu-west-3", &filter);
        assert_eq!(
            cmd,
            "aws ec2 describe-images --region eu-west-3 --owners amazon --filters Name=architecture,Values=x86_64 Name=name,Values=al2023-ami-2023* --output json"
        );
    }

    #[test]
    fn test_static_lookup() {
        let lookup = StaticLookup::new()
            .with_zones("us-west-2", &["us-west-2b", "us-west-2c"])
            .with_image("us-west-2", "ami-123");
        assert_eq!(
            lookup.availability_zones("us-west-2").unwrap(),
            vec!["us-west-2b", "us-west-2c"]
        );
        assert_eq!(
            lookup.availability_zones("eu-north-1").unwrap(),
            vec!["eu-north-1a", "eu-north-1b", "eu-north-1c"]
        );
        let filter = ImageFilter::default();
        assert_eq!(
            lookup.latest_image("us-west-2", &filter).unwrap(),
            "ami-123"
        );
        assert_eq!(
            lookup.latest_image("eu-north-1", &filter).unwrap(),
            "ami-offline-eu-north-1"
        );
    }
}
