//! AWS region codes and their display names

const REGIONS: &[(&str, &str)] = &[
    ("af-south-1", "Africa (Cape Town)"),
    ("ap-east-1", "Asia Pacific (Hong Kong)"),
    ("ap-south-1", "Asia Pacific (Mumbai)"),
    ("ap-south-2", "Asia Pacific (Hyderabad)"),
    ("ap-northeast-1", "Asia Pacific (Tokyo)"),
    ("ap-northeast-2", "Asia Pacific (Seoul)"),
    ("ap-northeast-3", "Asia Pacific (Osaka)"),
    ("ap-southeast-1", "Asia Pacific (Singapore)"),
    ("ap-southeast-2", "Asia Pacific (Sydney)"),
    ("ap-southeast-3", "Asia Pacific (Jakarta)"),
    ("ap-southeast-4", "Asia Pacific (Melbourne)"),
    ("ca-central-1", "Canada (Central)"),
    ("cn-north-1", "China (Beijing)"),
    ("cn-northwest-1", "China (Ningxia)"),
    ("eu-central-1", "Europe (Frankfurt)"),
    ("eu-central-2", "Europe (Zurich)"),
    ("eu-north-1", "Europe (Stockholm)"),
    ("eu-south-1", "Europe (Milan)"),
    ("eu-south-2", "Europe (Spain)"),
    ("eu-west-1", "Europe (Ireland)"),
    ("eu-west-2", "Europe (London)"),
    ("eu-west-3", "Europe (Paris)"),
    ("il-central-1", "Israel (Tel Aviv)"),
    ("me-central-1", "Middle East (UAE)"),
    ("me-south-1", "Middle East (Bahrain)"),
    ("sa-east-1", "South America (Sao Paulo)"),
    ("us-east-1", "US East (N. Virginia)"),
    ("us-east-2", "US East (Ohio)"),
    ("us-gov-east-1", "AWS GovCloud (US-East)"),
    ("us-gov-west-1", "AWS GovCloud (US-West)"),
    ("us-west-1", "US West (N. California)"),
    ("us-west-2", "US West (Oregon)"),
];

/// Display name of a region code, the code itself if it is not known
pub fn region_name(code: &str) -> &str {
    REGIONS
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, name)| *name)
        .unwrap_or(code)
}

/// Split an availability zone like `eu-central-1a` into region and zone
/// letter
pub fn split_availability_zone(zone: &str) -> Option<(&str, char)> {
    let letter = zone.chars().last()?;
    if !letter.is_ascii_alphabetic() {
        return None;
    }
    Some((&zone[..zone.len() - letter.len_utf8()], letter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_name() {
        assert_eq!(region_name("eu-central-1"), "Europe (Frankfurt)");
        assert_eq!(region_name("mars-north-1"), "mars-north-1");
    }

    #[test]
    fn test_split_availability_zone() {
        assert_eq!(split_availability_zone("eu-central-1a"), Some(("eu-central-1", 'a')));
        assert_eq!(split_availability_zone("eu-central-1"), None);
        assert_eq!(split_availability_zone(""), None);
    }
}
