pub static DIRECTIONALS: &[(&str, &str)] = &[
    ("NORTH", "N"),
    ("SOUTH", "S"),
    ("EAST", "E"),
    ("WEST", "W"),
    ("NORTHEAST", "NE"),
    ("NORTHWEST", "NW"),
    ("SOUTHEAST", "SE"),
    ("SOUTHWEST", "SW"),
    ("N.", "N"),
    ("S.", "S"),
    ("E.", "E"),
    ("W.", "W"),
];

/// USPS street suffixes (Publication 28, Appendix C1 subset)
pub static SUFFIXES: &[(&str, &str)] = &[
    ("ALLEE", "ALY"),
    ("ALLEY", "ALY"),
    ("ALLY", "ALY"),
    ("ANEX", "ANX"),
    ("ANNEX", "ANX"),
    ("ARCADE", "ARC"),
    ("AVENUE", "AVE"),
    ("AVEN", "AVE"),
    ("AVN", "AVE"),
    ("BAYOU", "BYU"),
    ("BEACH", "BCH"),
    ("BEND", "BND"),
    ("BLUFF", "BLF"),
    ("BOULEVARD", "BLVD"),
    ("BOUL", "BLVD"),
    ("BRANCH", "BR"),
    ("BRIDGE", "BRG"),
    ("BROOK", "BRK"),
    ("BURG", "BG"),
    ("BYPASS", "BYP"),
    ("CAMP", "CP"),
    ("CANYON", "CYN"),
    ("CAPE", "CPE"),
    ("CAUSEWAY", "CSWY"),
    ("CENTER", "CTR"),
    ("CIRCLE", "CIR"),
    ("CLIFF", "CLF"),
    ("CLUB", "CLB"),
    ("COMMON", "CMN"),
    ("CORNER", "COR"),
    ("COURSE", "CRSE"),
    ("COURT", "CT"),
    ("COVE", "CV"),
    ("CREEK", "CRK"),
    ("CRESCENT", "CRES"),
    ("CROSSING", "XING"),
    ("DALE", "DL"),
    ("DAM", "DM"),
    ("DIVIDE", "DV"),
    ("DRIVE", "DR"),
    ("ESTATE", "EST"),
    ("EXPRESSWAY", "EXPY"),
    ("EXTENSION", "EXT"),
    ("FALLS", "FLS"),
    ("FERRY", "FRY"),
    ("FIELD", "FLD"),
    ("FLAT", "FLT"),
    ("FORD", "FRD"),
    ("FOREST", "FRST"),
    ("FORGE", "FGR"),
    ("FORWARD", "FWD"),
    ("GARDEN", "GDN"),
    ("GATEWAY", "GTWY"),
    ("GLEN", "GLN"),
    ("GREEN", "GRN"),
    ("GROVE", "GRV"),
    ("HARBOR", "HBR"),
    ("HAVEN", "HVN"),
    ("HEIGHTS", "HTS"),
    ("HIGHWAY", "HWY"),
    ("HILL", "HL"),
    ("HOLLOW", "HOLW"),
    ("INLET", "INLT"),
    ("ISLAND", "IS"),
    ("ISLE", "ISLE"),
    ("JUNCTION", "JCT"),
    ("KEY", "KY"),
    ("KNOLL", "KNL"),
    ("LAKE", "LK"),
    ("LANDING", "LNDG"),
    ("LANE", "LN"),
    ("LIGHT", "LGT"),
    ("LOAF", "LF"),
    ("LOCK", "LCK"),
    ("LODGE", "LDG"),
    ("LOOP", "LOOP"),
    ("MALL", "MALL"),
    ("MANOR", "MNR"),
    ("MEADOW", "MDW"),
    ("MILL", "ML"),
    ("MOUNT", "MT"),
    ("MOUNTAIN", "MTN"),
    ("NORTH", "N"),
    ("PARK", "PARK"),
    ("PARKWAY", "PKWY"),
    ("PASS", "PASS"),
    ("PASSAGE", "PSGE"),
    ("PATH", "PATH"),
    ("PIKE", "PIKE"),
    ("PINE", "PNE"),
    ("PLACE", "PL"),
    ("PLAZA", "PLZ"),
    ("POINT", "PT"),
    ("PORT", "PRT"),
    ("PRAIRIE", "PR"),
    ("RADIAL", "RADL"),
    ("RANCH", "RNCH"),
    ("RAPIDS", "RPD"),
    ("REST", "RST"),
    ("RIDGE", "RDG"),
    ("RIVER", "RIV"),
    ("ROAD", "RD"),
    ("ROW", "ROW"),
    ("RUN", "RUN"),
    ("SHORE", "SHR"),
    ("SPRING", "SPG"),
    ("SQUARE", "SQ"),
    ("STATION", "STA"),
    ("STRAVENUE", "STRA"),
    ("STREAM", "STRM"),
    ("STREET", "ST"),
    ("SUMMIT", "SMT"),
    ("TERRACE", "TER"),
    ("TRACE", "TRCE"),
    ("TRAIL", "TRL"),
    ("TUNNEL", "TUNL"),
    ("TURNPIKE", "TPKE"),
    ("UNION", "UN"),
    ("VALLEY", "VLY"),
    ("VIEW", "VW"),
    ("VILLAGE", "VLG"),
    ("VILLE", "VL"),
    ("WALK", "WALK"),
    ("WALL", "WALL"),
    ("WAY", "WAY"),
    ("WELL", "WL"),
];

/// 50 states, DC and the five populated territories
pub static STATES: &[(&str, &str)] = &[
    ("ALABAMA", "AL"),
    ("ALASKA", "AK"),
    ("ARIZONA", "AZ"),
    ("ARKANSAS", "AR"),
    ("CALIFORNIA", "CA"),
    ("COLORADO", "CO"),
    ("CONNECTICUT", "CT"),
    ("DELAWARE", "DE"),
    ("DISTRICT OF COLUMBIA", "DC"),
    ("FLORIDA", "FL"),
    ("GEORGIA", "GA"),
    ("HAWAII", "HI"),
    ("IDAHO", "ID"),
    ("ILLINOIS", "IL"),
    ("INDIANA", "IN"),
    ("IOWA", "IA"),
    ("KANSAS", "KS"),
    ("KENTUCKY", "KY"),
    ("LOUISIANA", "LA"),
    ("MAINE", "ME"),
    ("MARYLAND", "MD"),
    ("MASSACHUSETTS", "MA"),
    ("MICHIGAN", "MI"),
    ("MINNESOTA", "MN"),
    ("MISSISSIPPI", "MS"),
    ("MISSOURI", "MO"),
    ("MONTANA", "MT"),
    ("NEBRASKA", "NE"),
    ("NEVADA", "NV"),
    ("NEW HAMPSHIRE", "NH"),
    ("NEW JERSEY", "NJ"),
    ("NEW MEXICO", "NM"),
    ("NEW YORK", "NY"),
    ("NORTH CAROLINA", "NC"),
    ("NORTH DAKOTA", "ND"),
    ("OHIO", "OH"),
    ("OKLAHOMA", "OK"),
    ("OREGON", "OR"),
    ("PENNSYLVANIA", "PA"),
    ("RHODE ISLAND", "RI"),
    ("SOUTH CAROLINA", "SC"),
    ("SOUTH DAKOTA", "SD"),
    ("TENNESSEE", "TN"),
    ("TEXAS", "TX"),
    ("UTAH", "UT"),
    ("VERMONT", "VT"),
    ("VIRGINIA", "VA"),
    ("WASHINGTON", "WA"),
    ("WEST VIRGINIA", "WV"),
    ("WISCONSIN", "WI"),
    ("WYOMING", "WY"),
    ("PUERTO RICO", "PR"),
    ("GUAM", "GU"),
    ("VIRGIN ISLANDS", "VI"),
    ("AMERICAN SAMOA", "AS"),
    ("NORTHERN MARIANA ISLANDS", "MP"),
];

/// Secondary unit designators and their canonical form.
///
/// Longer spellings come before their abbreviations (`FLOOR` before `FL`) so
/// an alternation built from this table tries the full word first. Only
/// `APARTMENT`, `SUITE` and `#` are rewritten.
pub static UNIT_DESIGNATORS: &[(&str, &str)] = &[
    ("APARTMENT", "APT"),
    ("APT", "APT"),
    ("UNIT", "UNIT"),
    ("SUITE", "STE"),
    ("STE", "STE"),
    ("FLOOR", "FLOOR"),
    ("FL", "FL"),
    ("ROOM", "ROOM"),
    ("RM", "RM"),
    ("#", "APT"),
];

/// look up `key` in one of the tables above
pub fn lookup(table: &'static [(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(long, _)| *long == key)
        .map(|(_, short)| *short)
}
