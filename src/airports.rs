//! Static airport reference table.
//!
//! Covers the cities the rule-based interpreter understands plus the major
//! connection hubs. Lookups for codes outside the table return `None`, and
//! callers must treat that as "unknown" rather than as an error.

/// One airport: IATA code, served city, ISO country code and coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Airport {
    pub code: &'static str,
    pub city: &'static str,
    pub country: &'static str,
    pub lat: f64,
    pub lng: f64,
}

const fn airport(code: &'static str, city: &'static str, country: &'static str, lat: f64, lng: f64) -> Airport {
    Airport { code, city, country, lat, lng }
}

static AIRPORTS: &[Airport] = &[
    // Canada
    airport("YYZ", "Toronto", "CA", 43.6777, -79.6248),
    airport("YTZ", "Toronto", "CA", 43.6275, -79.3962),
    airport("YUL", "Montreal", "CA", 45.4706, -73.7408),
    airport("YHU", "Montreal", "CA", 45.5175, -73.4169),
    airport("YVR", "Vancouver", "CA", 49.1967, -123.1815),
    airport("YXX", "Vancouver", "CA", 49.0253, -122.3606),
    airport("YYC", "Calgary", "CA", 51.1215, -114.0076),
    airport("YOW", "Ottawa", "CA", 45.3225, -75.6692),
    airport("YEG", "Edmonton", "CA", 53.3097, -113.5800),
    // United States
    airport("JFK", "New York", "US", 40.6413, -73.7781),
    airport("LGA", "New York", "US", 40.7769, -73.8740),
    airport("EWR", "New York", "US", 40.6895, -74.1745),
    airport("LAX", "Los Angeles", "US", 33.9416, -118.4085),
    airport("BUR", "Los Angeles", "US", 34.2007, -118.3585),
    airport("SNA", "Los Angeles", "US", 33.6762, -117.8675),
    airport("LGB", "Los Angeles", "US", 33.8177, -118.1516),
    airport("ONT", "Los Angeles", "US", 34.0559, -117.6005),
    airport("SFO", "San Francisco", "US", 37.6213, -122.3790),
    airport("OAK", "San Francisco", "US", 37.7126, -122.2197),
    airport("SJC", "San Francisco", "US", 37.3639, -121.9289),
    airport("ORD", "Chicago", "US", 41.9742, -87.9073),
    airport("MDW", "Chicago", "US", 41.7868, -87.7522),
    airport("IAD", "Washington DC", "US", 38.9531, -77.4565),
    airport("DCA", "Washington DC", "US", 38.8512, -77.0402),
    airport("BWI", "Washington DC", "US", 39.1774, -76.6684),
    airport("MIA", "Miami", "US", 25.7959, -80.2870),
    airport("FLL", "Miami", "US", 26.0742, -80.1506),
    airport("PBI", "Miami", "US", 26.6857, -80.0928),
    airport("DFW", "Dallas", "US", 32.8998, -97.0403),
    airport("DAL", "Dallas", "US", 32.8471, -96.8518),
    airport("IAH", "Houston", "US", 29.9902, -95.3368),
    airport("HOU", "Houston", "US", 29.6454, -95.2789),
    airport("BOS", "Boston", "US", 42.3656, -71.0096),
    airport("SEA", "Seattle", "US", 47.4502, -122.3088),
    // Europe
    airport("LHR", "London", "GB", 51.4700, -0.4543),
    airport("LGW", "London", "GB", 51.1537, -0.1821),
    airport("STN", "London", "GB", 51.8860, 0.2389),
    airport("LTN", "London", "GB", 51.8763, -0.3717),
    airport("LCY", "London", "GB", 51.5048, 0.0495),
    airport("SEN", "London", "GB", 51.5703, 0.6933),
    airport("CDG", "Paris", "FR", 49.0097, 2.5479),
    airport("ORY", "Paris", "FR", 48.7262, 2.3652),
    airport("FCO", "Rome", "IT", 41.8003, 12.2389),
    airport("CIA", "Rome", "IT", 41.7994, 12.5949),
    airport("MXP", "Milan", "IT", 45.6306, 8.7281),
    airport("LIN", "Milan", "IT", 45.4451, 9.2767),
    airport("BGY", "Milan", "IT", 45.6739, 9.7042),
    airport("BER", "Berlin", "DE", 52.3667, 13.5033),
    airport("AMS", "Amsterdam", "NL", 52.3105, 4.7683),
    airport("FRA", "Frankfurt", "DE", 50.0379, 8.5622),
    airport("MUC", "Munich", "DE", 48.3537, 11.7750),
    airport("MAD", "Madrid", "ES", 40.4983, -3.5676),
    airport("BCN", "Barcelona", "ES", 41.2974, 2.0833),
    airport("IST", "Istanbul", "TR", 41.2753, 28.7519),
    // Asia and Middle East
    airport("PEK", "Beijing", "CN", 40.0799, 116.6031),
    airport("PKX", "Beijing", "CN", 39.5098, 116.4105),
    airport("PVG", "Shanghai", "CN", 31.1443, 121.8083),
    airport("SHA", "Shanghai", "CN", 31.1979, 121.3363),
    airport("CAN", "Guangzhou", "CN", 23.3924, 113.2988),
    airport("SZX", "Shenzhen", "CN", 22.6393, 113.8107),
    airport("CTU", "Chengdu", "CN", 30.5785, 103.9471),
    airport("TFU", "Chengdu", "CN", 30.3125, 104.4411),
    airport("CKG", "Chongqing", "CN", 29.7192, 106.6417),
    airport("WUH", "Wuhan", "CN", 30.7838, 114.2081),
    airport("HKG", "Hong Kong", "HK", 22.3080, 113.9185),
    airport("MFM", "Macau", "MO", 22.1496, 113.5915),
    airport("TPE", "Taipei", "TW", 25.0797, 121.2342),
    airport("TSA", "Taipei", "TW", 25.0694, 121.5525),
    airport("NRT", "Tokyo", "JP", 35.7720, 140.3929),
    airport("HND", "Tokyo", "JP", 35.5494, 139.7798),
    airport("ICN", "Seoul", "KR", 37.4602, 126.4407),
    airport("DXB", "Dubai", "AE", 25.2532, 55.3657),
    airport("DOH", "Doha", "QA", 25.2731, 51.6081),
];

/// Look up an airport by IATA code (case-insensitive).
pub fn lookup(code: &str) -> Option<&'static Airport> {
    AIRPORTS.iter().find(|a| a.code.eq_ignore_ascii_case(code))
}

/// ISO country code for an airport, if known.
pub fn country_of(code: &str) -> Option<&'static str> {
    lookup(code).map(|a| a.country)
}

/// All airport codes serving a city, matched exactly first and then by
/// substring in either direction ("paris, france" finds Paris).
pub fn airports_for_city(name: &str) -> Vec<String> {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let exact: Vec<String> = AIRPORTS
        .iter()
        .filter(|a| a.city.to_lowercase() == needle)
        .map(|a| a.code.to_string())
        .collect();
    if !exact.is_empty() {
        return exact;
    }

    if needle.len() == 3 {
        if let Some(a) = lookup(&needle) {
            return vec![a.code.to_string()];
        }
    }

    let mut fuzzy_city: Option<&str> = None;
    for a in AIRPORTS {
        let city = a.city.to_lowercase();
        if needle.contains(&city) || city.contains(&needle) {
            fuzzy_city = Some(a.city);
            break;
        }
    }

    match fuzzy_city {
        Some(city) => AIRPORTS
            .iter()
            .filter(|a| a.city == city)
            .map(|a| a.code.to_string())
            .collect(),
        None => Vec::new(),
    }
}

/// Known city names, longest first so multi-word cities match before their
/// prefixes.
pub fn known_cities() -> Vec<&'static str> {
    let mut cities: Vec<&'static str> = AIRPORTS.iter().map(|a| a.city).collect();
    cities.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    cities.dedup();
    cities
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_city_with_multiple_airports() {
        assert_eq!(airports_for_city("Paris"), vec!["CDG", "ORY"]);
        assert_eq!(airports_for_city("new york"), vec!["JFK", "LGA", "EWR"]);
    }

    #[test]
    fn test_fuzzy_and_code_lookup() {
        assert_eq!(airports_for_city("Ottawa, Canada"), vec!["YOW"]);
        assert_eq!(airports_for_city("cdg"), vec!["CDG"]);
        assert!(airports_for_city("Atlantis").is_empty());
    }

    #[test]
    fn test_country_of() {
        assert_eq!(country_of("yow"), Some("CA"));
        assert_eq!(country_of("ZZZ"), None);
    }

    #[test]
    fn test_known_cities_longest_first() {
        let cities = known_cities();
        let pos_ny = cities.iter().position(|c| *c == "New York").unwrap();
        let pos_rome = cities.iter().position(|c| *c == "Rome").unwrap();
        assert!(pos_ny < pos_rome);
    }
}
