//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Quantity resolution constants
pub mod quantity {
    /// Entities whose relevant area is the footprint rather than the side area
    pub const FOOTPRINT_ENTITIES: &[&str] = &[
        "IfcSlab",
        "IfcRoof",
        "IfcCovering",
        "IfcStair",
        "IfcStairFlight",
        "IfcRamp",
        "IfcFooting",
    ];

    /// Declared quantity names
    pub const NET_VOLUME: &str = "Net Volume";
    pub const NET_FOOTPRINT_AREA: &str = "Net Footprint Area";
    pub const NET_SIDE_AREA: &str = "Net Side Area";
    pub const LENGTH: &str = "Length";

    /// Property-set keys, English first then German
    pub const PSET_VOLUME: &[&str] = &["Volume", "Volumen"];
    pub const PSET_AREA: &[&str] = &["Area", "Fläche"];
    pub const PSET_LENGTH: &[&str] = &["Length", "Länge"];

    /// Decimal places kept for every quantity
    pub const DECIMALS: i32 = 4;
}

/// Aggregation constants
pub mod aggregation {
    /// Hex characters kept from the SHA-256 digest of a grouping key
    pub const GROUP_ID_HEX_LEN: usize = 16;

    /// Minimum members for a group to be compiled
    pub const MIN_GROUP_SIZE: usize = 2;

    pub const OVERVIEW_FILE: &str = "aggregation_overview.json";
    pub const UNIQUE_DIR: &str = "Elements_Unique";
    pub const AGGREGATED_DIR: &str = "Elements_Aggregated";
}

/// Dissection constants
pub mod dissection {
    pub const ELEMENTS_DIR: &str = "Elements";
    pub const LAYERS_DIR: &str = "Target_Layers";
}

/// Taxonomy constants
pub mod taxonomy {
    /// Manifest file present in every taxonomy directory
    pub const MANIFEST_FILE: &str = "index.json";

    /// Material names offered at a leaf node
    pub const MAX_MATERIAL_OPTIONS: usize = 40;

    /// Material options offered when densities are included
    pub const MAX_MATERIAL_OPTIONS_WITH_DENSITY: usize = 30;

    /// Density field in indicator records
    pub const DENSITY_FIELD: &str = "Density (kg/m3)";

    /// Density label shown to the classifier
    pub const DENSITY_OPTION_LABEL: &str = "Density [kg/m³]";
}

/// Traversal constants
pub mod traversal {
    /// Upper bound on classification steps for one record
    pub const DEFAULT_MAX_STEPS: usize = 32;

    /// Response key for category selection
    pub const CATEGORY_KEY: &str = "Matched Category";

    /// Response key for material selection
    pub const MATERIALS_KEY: &str = "Matched Materials";

    /// Identity file written next to the step logs of a record
    pub const RECORD_FILE: &str = "record.json";
}

/// LLM inference footprint estimate
pub mod footprint {
    /// Electricity per processed token (kWh)
    pub const KWH_PER_TOKEN: f64 = 0.000_002;

    /// Grid emission factor (kg CO2-eq per kWh)
    pub const KG_CO2_PER_KWH: f64 = 0.242;
}

/// HTTP/Network constants
pub mod network {
    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    /// Upper bound for exponential retry delay (seconds)
    pub const MAX_RETRY_DELAY_SECS: u64 = 30;
}
