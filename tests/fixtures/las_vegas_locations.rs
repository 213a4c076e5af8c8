//! Real Las Vegas / Henderson restaurants served from one wash facility.
//!
//! Coordinates sourced from OpenStreetMap via Overpass API. Tote counts are
//! made up but stable, so routing results are reproducible.

use tote_planner::location::Location;

/// A customer row: name, coordinates, daily pickups, weekly dropoffs.
type Customer = (&'static str, f64, f64, u32, u32);

const DEPOT: (&str, f64, f64) = ("Tote Wash Facility", 36.1070664, -115.0591256);

const STRIP_CUSTOMERS: &[Customer] = &[
    ("Hard Rock Cafe", 36.1041592, -115.1722166, 4, 6),
    ("SW Steakhouse", 36.1262145, -115.1669146, 3, 0),
    ("Public House", 36.1219193, -115.1689317, 2, 3),
    ("Brooklyn Bowl", 36.1175388, -115.1695094, 5, 0),
    ("Yard House", 36.1177147, -115.1691992, 3, 4),
    ("Gordon Ramsay BurGR", 36.1107195, -115.1720818, 6, 8),
    ("Spago by Wolfgang Puck", 36.1139368, -115.1741462, 2, 0),
    ("Bacchanal Buffet", 36.1159581, -115.1762929, 8, 10),
];

const EAST_SIDE_CUSTOMERS: &[Customer] = &[
    ("Pei Wei Town Square", 36.0810469, -115.1472694, 2, 2),
    ("Hello Tokyo", 36.1161627, -115.0902096, 1, 0),
    ("Golden China", 36.1171166, -115.0904647, 3, 5),
    ("Tomo Sushi", 36.0992464, -115.1142123, 2, 0),
    ("Chuck Wagon Restaurant", 36.1072491, -115.0593482, 4, 4),
    ("Roma Pizza", 36.1012461, -115.0753039, 3, 2),
];

const HENDERSON_CUSTOMERS: &[Customer] = &[
    ("I Love Sushi Henderson", 35.9916660, -115.1028343, 2, 1),
    ("Islander's Grill", 36.0335058, -114.9856162, 3, 0),
    ("Naga", 36.0137634, -114.9928676, 1, 2),
    ("RibCage", 35.9949754, -115.0999810, 4, 3),
];

fn build(customers: impl IntoIterator<Item = &'static Customer>) -> Vec<Location> {
    let (name, latitude, longitude) = DEPOT;
    let depot = Location {
        index: 0,
        name: name.to_string(),
        latitude,
        longitude,
        address: String::new(),
        pickup_demand: 0,
        dropoff_demand: 0,
        location_type: "depot".to_string(),
        pickup_type: String::new(),
    };

    std::iter::once(depot)
        .chain(customers.into_iter().enumerate().map(
            |(i, &(name, latitude, longitude, pickup, dropoff))| Location {
                index: i + 1,
                name: name.to_string(),
                latitude,
                longitude,
                address: String::new(),
                pickup_demand: pickup,
                dropoff_demand: dropoff,
                location_type: "restaurant".to_string(),
                pickup_type: "daily".to_string(),
            },
        ))
        .collect()
}

/// The depot followed by every customer.
pub fn all_locations() -> Vec<Location> {
    build(
        STRIP_CUSTOMERS
            .iter()
            .chain(EAST_SIDE_CUSTOMERS)
            .chain(HENDERSON_CUSTOMERS),
    )
}

/// The depot followed by the first `count` customers.
pub fn sample_locations(count: usize) -> Vec<Location> {
    all_locations().into_iter().take(count + 1).collect()
}
