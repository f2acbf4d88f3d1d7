//! Static product catalog and story templates.
//!
//! Products are a fixed set; each one is a storage partition for its epics.

use serde::Serialize;

use crate::models::Epic;

/// A product in the catalog
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub sub_products: &'static [&'static str],
}

pub const PRODUCTS: &[Product] = &[
    Product {
        id: "horizon",
        name: "Horizon",
        description: "Financial Risk Modeling Suite",
        icon: "TrendingUp",
        sub_products: &["Horizon Risk", "Horizon Regime"],
    },
    Product {
        id: "pulse-sdg",
        name: "Pulse_SDG",
        description: "Sustainable Development Goals Analytics",
        icon: "Activity",
        sub_products: &["OrderBookGPT"],
    },
    Product {
        id: "alpharisk-studio",
        name: "AlphaRisk Studio",
        description: "Composable Simulation OS - 12-Agent Marketplace",
        icon: "Sparkles",
        sub_products: &[
            "RegimeDetector",
            "OrderbookGPT",
            "CausalValidator",
            "AlphaForge",
            "RiskOracle",
            "CrowdingRadar",
            "ExecutionOptimizer",
            "LiquidityStress",
            "PortfolioArchitect",
            "CausalCouncil",
            "RegimeAllocator",
            "WorkflowOrchestrator",
        ],
    },
];

/// Looks up a catalog product by id
pub fn product_by_id(id: &str) -> Option<&'static Product> {
    PRODUCTS.iter().find(|p| p.id == id)
}

/// A catalog product together with its stored epics
#[derive(Debug, Clone)]
pub struct ProductEpics {
    pub product: &'static Product,
    pub epics: Vec<Epic>,
}

/// Kind of story template offered when writing a story by hand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Feature,
    Technical,
    Documentation,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 3] = [
        TemplateKind::Feature,
        TemplateKind::Technical,
        TemplateKind::Documentation,
    ];

    pub fn template(self) -> &'static StoryTemplate {
        match self {
            TemplateKind::Feature => &FEATURE_TEMPLATE,
            TemplateKind::Technical => &TECHNICAL_TEMPLATE,
            TemplateKind::Documentation => &DOCUMENTATION_TEMPLATE,
        }
    }
}

impl std::fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.template().name)
    }
}

/// Boilerplate used to pre-fill a new story
#[derive(Debug)]
pub struct StoryTemplate {
    pub name: &'static str,
    pub as_a: &'static str,
    pub i_want_prefix: &'static str,
    pub so_that_prefix: &'static str,
    pub acceptance_criteria: &'static [&'static str],
    pub definition_of_done: &'static [&'static str],
}

static FEATURE_TEMPLATE: StoryTemplate = StoryTemplate {
    name: "Feature Story",
    as_a: "product user",
    i_want_prefix: "to be able to",
    so_that_prefix: "I can",
    acceptance_criteria: &[
        "Given [context], when [action], then [expected result]",
        "The feature handles edge cases gracefully",
        "Performance meets defined SLAs",
    ],
    definition_of_done: &[
        "Code reviewed and approved",
        "Unit tests written and passing",
        "Documentation updated",
        "Deployed to staging environment",
    ],
};

static TECHNICAL_TEMPLATE: StoryTemplate = StoryTemplate {
    name: "Technical Story",
    as_a: "development team",
    i_want_prefix: "to implement",
    so_that_prefix: "we can",
    acceptance_criteria: &[
        "Implementation follows architecture guidelines",
        "All tests pass in CI/CD pipeline",
        "No security vulnerabilities introduced",
    ],
    definition_of_done: &[
        "Code reviewed by senior engineer",
        "Integration tests written",
        "Infrastructure changes documented",
        "Monitoring and alerting configured",
    ],
};

static DOCUMENTATION_TEMPLATE: StoryTemplate = StoryTemplate {
    name: "Documentation Story",
    as_a: "stakeholder",
    i_want_prefix: "to have documentation for",
    so_that_prefix: "I can understand",
    acceptance_criteria: &[
        "Documentation is clear and comprehensive",
        "Examples and diagrams included where helpful",
        "Reviewed by subject matter expert",
    ],
    definition_of_done: &[
        "Technical review completed",
        "Published to documentation site",
        "Team notified of updates",
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_lookup() {
        assert_eq!(product_by_id("horizon").map(|p| p.name), Some("Horizon"));
        assert_eq!(
            product_by_id("alpharisk-studio").map(|p| p.sub_products.len()),
            Some(12)
        );
        assert!(product_by_id("unknown").is_none());
    }

    #[test]
    fn test_templates() {
        let t = TemplateKind::Technical.template();
        assert_eq!(t.as_a, "development team");
        assert_eq!(TemplateKind::Feature.to_string(), "Feature Story");
    }
}
