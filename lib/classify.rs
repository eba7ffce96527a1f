//! Side support records and environment classification.

use serde::{Deserialize, Serialize};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Support level of a mod on one side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Support {
    Required,
    Optional,
    Unsupported,
    #[default]
    Unknown,
}

/// Client and server support of a single mod.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SideSupport {
    pub client: Support,
    pub server: Support,
}

/// Where a mod has to be installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Only on the client.
    Client,
    /// Only on the server.
    Server,
    /// On both sides.
    Both,
    /// Optional on both sides.
    Optional,
    /// The side could not be determined (failed lookup or contradictory record).
    Unknown,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Support {
    /// Parse a registry or manifest value. Anything unrecognised is `Unknown`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "required" => Support::Required,
            "optional" => Support::Optional,
            "unsupported" => Support::Unsupported,
            _ => Support::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Support::Required => "required",
            Support::Optional => "optional",
            Support::Unsupported => "unsupported",
            Support::Unknown => "unknown",
        }
    }
}

impl SideSupport {
    pub fn new(client: Support, server: Support) -> Self {
        Self { client, server }
    }

    /// Record used when nothing is known about a mod.
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Whether both sides carry a definite value.
    pub fn is_complete(&self) -> bool {
        self.client != Support::Unknown && self.server != Support::Unknown
    }

    /// Derived category. See [`classify`].
    pub fn category(&self) -> Category {
        classify(*self)
    }
}

impl Category {
    /// Every category, in report order.
    pub const ALL: [Category; 5] = [
        Category::Client,
        Category::Server,
        Category::Both,
        Category::Optional,
        Category::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Client => "Client",
            Category::Server => "Server",
            Category::Both => "Both",
            Category::Optional => "Optional",
            Category::Unknown => "Unknown",
        }
    }

    /// Whether a mod of this category belongs in a client installation.
    pub fn runs_on_client(&self) -> bool {
        matches!(self, Category::Client | Category::Both)
    }

    /// Whether a mod of this category belongs in a server installation.
    pub fn runs_on_server(&self) -> bool {
        matches!(self, Category::Server | Category::Both)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Map a side support record to its category.
///
/// Unknown on either side yields [`Category::Unknown`]. A mod unsupported on both
/// sides is contradictory and is also reported as unknown. When one side is
/// unsupported and the other optional, the mod only ever runs on the optional side.
pub fn classify(support: SideSupport) -> Category {
    use Support::*;

    match (support.client, support.server) {
        (Unknown, _) | (_, Unknown) => Category::Unknown,
        (Required, Required) => Category::Both,
        (Required, Optional | Unsupported) => Category::Client,
        (Optional | Unsupported, Required) => Category::Server,
        (Optional, Optional) => Category::Optional,
        (Optional, Unsupported) => Category::Client,
        (Unsupported, Optional) => Category::Server,
        (Unsupported, Unsupported) => Category::Unknown,
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl std::fmt::Display for Support {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
