//! Postcode based delivery classification.
//!
//! Regions are metro areas and regional centres with a freight depot. Delivery
//! inside any region is free; everything else is quoted separately.

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::Postcode;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ShippingRegion {
    pub name: &'static str,
    pub state: &'static str,
    #[serde(skip)]
    pub ranges: &'static [(u16, u16)],
}

macro_rules! region {
    ($name:literal, $state:literal, [$(($start:literal, $end:literal)),+ $(,)?]) => {
        ShippingRegion { name: $name, state: $state, ranges: &[$(($start, $end)),+] }
    };
}

/// Earlier entries win where ranges overlap.
pub const SHIPPING_REGIONS: &[ShippingRegion] = &[
    region!("Perth", "WA", [(6000, 6199), (6200, 6214)]),
    region!("Bunbury", "WA", [(6230, 6239)]),
    region!("Sydney", "NSW", [(2000, 2249), (2555, 2574), (2740, 2786)]),
    region!("Melbourne", "VIC", [(3000, 3210), (3335, 3341), (3427, 3442), (3750, 3810), (3910, 3978)]),
    region!("Brisbane", "QLD", [(4000, 4209), (4300, 4306), (4500, 4521)]),
    region!("Adelaide", "SA", [(5000, 5199)]),
    region!("Canberra", "ACT", [(2600, 2620), (2900, 2920)]),
    region!("Hobart", "TAS", [(7000, 7099), (7170, 7179)]),
    region!("Darwin", "NT", [(800, 899)]),
    region!("Gold Coast", "QLD", [(4207, 4230)]),
    region!("Newcastle", "NSW", [(2280, 2330)]),
    region!("Wollongong", "NSW", [(2500, 2535)]),
    region!("Geelong", "VIC", [(3211, 3227)]),
    region!("Geraldton", "WA", [(6530, 6532)]),
    region!("Kalgoorlie", "WA", [(6430, 6433)]),
    region!("Albany", "WA", [(6330, 6333)]),
    region!("Karratha", "WA", [(6714, 6714)]),
    region!("Port Hedland", "WA", [(6721, 6722)]),
    region!("Dubbo", "NSW", [(2830, 2832)]),
    region!("Wagga Wagga", "NSW", [(2650, 2652)]),
    region!("Albury", "NSW", [(2640, 2641)]),
    region!("Tamworth", "NSW", [(2340, 2341)]),
    region!("Orange", "NSW", [(2800, 2800)]),
    region!("Bathurst", "NSW", [(2795, 2795)]),
    region!("Coffs Harbour", "NSW", [(2450, 2452)]),
    region!("Lismore", "NSW", [(2480, 2480)]),
    region!("Port Macquarie", "NSW", [(2444, 2446)]),
    region!("Ballarat", "VIC", [(3350, 3356)]),
    region!("Bendigo", "VIC", [(3550, 3556)]),
    region!("Shepparton", "VIC", [(3630, 3632)]),
    region!("Wodonga", "VIC", [(3690, 3691)]),
    region!("Warrnambool", "VIC", [(3280, 3282)]),
    region!("Traralgon", "VIC", [(3840, 3844)]),
    region!("Townsville", "QLD", [(4810, 4818)]),
    region!("Cairns", "QLD", [(4868, 4881)]),
    region!("Rockhampton", "QLD", [(4700, 4703)]),
    region!("Mackay", "QLD", [(4740, 4741)]),
    region!("Toowoomba", "QLD", [(4350, 4352)]),
    region!("Bundaberg", "QLD", [(4670, 4671)]),
    region!("Gladstone", "QLD", [(4680, 4680)]),
    region!("Sunshine Coast", "QLD", [(4550, 4575)]),
    region!("Mount Gambier", "SA", [(5290, 5291)]),
    region!("Port Augusta", "SA", [(5700, 5701)]),
    region!("Whyalla", "SA", [(5600, 5601)]),
    region!("Launceston", "TAS", [(7248, 7258)]),
    region!("Devonport", "TAS", [(7310, 7310)]),
    region!("Burnie", "TAS", [(7320, 7321)]),
    // Inside Darwin's range, so lookups resolve to Darwin. Kept for the region listing.
    region!("Alice Springs", "NT", [(870, 872)]),
];

const REMOTE_KEYWORDS: [&str; 9] = ["mine", "mining", "quarry", "pit", "camp", "site", "station", "pastoral", "remote"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryZone { Metro, #[default] Regional, Remote }

impl DeliveryZone {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Metro => "metro", Self::Regional => "regional", Self::Remote => "remote" }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s { "metro" => Some(Self::Metro), "regional" => Some(Self::Regional), "remote" => Some(Self::Remote), _ => None }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryClassification {
    pub zone: DeliveryZone,
    pub is_free_delivery: bool,
    pub delivery_note: String,
    pub region: Option<String>,
    pub state: Option<String>,
}

impl DeliveryClassification {
    fn quoted(zone: DeliveryZone, note: &str) -> Self {
        Self { zone, is_free_delivery: false, delivery_note: note.to_string(), region: None, state: None }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ShippingMessage {
    pub is_free_shipping: bool,
    pub message: String,
    pub short_message: String,
}

pub fn find_region(postcode: &Postcode) -> Option<&'static ShippingRegion> {
    let pc = postcode.value();
    SHIPPING_REGIONS.iter().find(|r| r.ranges.iter().any(|&(start, end)| (start..=end).contains(&pc)))
}

pub fn is_remote_address(address: &str) -> bool {
    let lower = address.to_lowercase();
    REMOTE_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Street deliveries need a four-digit postcode; anything else is confirmed by hand.
pub fn classify_delivery(postcode: &str, address: Option<&str>) -> DeliveryClassification {
    let parsed = match Postcode::parse(postcode) {
        Ok(pc) if pc.is_four_digit() => pc,
        _ => return DeliveryClassification::quoted(DeliveryZone::Regional, "Delivery to be confirmed"),
    };
    if address.is_some_and(is_remote_address) {
        return DeliveryClassification::quoted(DeliveryZone::Remote, "Remote/mine site - delivery quoted separately");
    }
    match find_region(&parsed) {
        Some(region) => DeliveryClassification {
            zone: DeliveryZone::Metro,
            is_free_delivery: true,
            delivery_note: "Free metro delivery".to_string(),
            region: Some(region.name.to_string()),
            state: Some(region.state.to_string()),
        },
        None => DeliveryClassification::quoted(DeliveryZone::Regional, "Delivery to be confirmed"),
    }
}

pub fn shipping_message(postcode: &str) -> ShippingMessage {
    match Postcode::parse(postcode).ok().as_ref().and_then(find_region) {
        Some(region) => ShippingMessage {
            is_free_shipping: true,
            message: format!("Free delivery to {}", region.name),
            short_message: "Free delivery".to_string(),
        },
        None => ShippingMessage {
            is_free_shipping: false,
            message: "Regional delivery - shipping will be quoted separately".to_string(),
            short_message: "Shipping quoted separately".to_string(),
        },
    }
}
