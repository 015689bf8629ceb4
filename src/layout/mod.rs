//! Radial graph layout.
//!
//! Places the query at the origin and every recommended paper on a circle
//! around it. The angle comes from the paper's display position and the radius
//! from its similarity rank:
//!
//! ```text
//! angle_i  = i * 2π / max(n, 1)
//! radius_i = base_radius + rank_i * radius_step
//! ```
//!
//! Layout is a pure function of its input; shuffling happens upstream.

use std::collections::HashMap;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::PaperRecord;

/// Id of the node representing the query.
pub const CENTER_ID: &str = "center";

pub const DEFAULT_BASE_RADIUS: f64 = 100.0;
pub const DEFAULT_RADIUS_STEP: f64 = 20.0;

pub const DEFAULT_CENTER_COLOR: &str = "#999999";
pub const DEFAULT_FALLBACK_COLOR: &str = "#808080";

/// Institution colors used when nothing else is configured.
pub const DEFAULT_INSTITUTION_COLORS: &[(&str, &str)] = &[
    ("九州工業大学", "#0000FF"),
    ("東京工業大学", "#008000"),
];

/// A point on the drawing plane.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0 };

    /// Point at `radius` from the origin, `angle` radians counter-clockwise
    /// from the positive x axis.
    pub fn polar(radius: f64, angle: f64) -> Self {
        Self {
            x: radius * angle.cos(),
            y: radius * angle.sin(),
        }
    }

    pub fn distance_from_origin(&self) -> f64 {
        self.x.hypot(self.y)
    }
}

/// Institution → node color mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorScheme {
    colors: HashMap<String, String>,
    fallback: String,
    center: String,
}

impl ColorScheme {
    /// Scheme with no institution colors; everything gets `fallback`.
    pub fn new(fallback: impl Into<String>, center: impl Into<String>) -> Self {
        Self {
            colors: HashMap::new(),
            fallback: fallback.into(),
            center: center.into(),
        }
    }

    pub fn with_color(mut self, institution: impl Into<String>, color: impl Into<String>) -> Self {
        self.colors.insert(institution.into(), color.into());
        self
    }

    /// Color for a paper from `institution`.
    pub fn color_for(&self, institution: &str) -> &str {
        self.colors
            .get(institution)
            .map(String::as_str)
            .unwrap_or(&self.fallback)
    }

    /// Color of the center node.
    pub fn center(&self) -> &str {
        &self.center
    }
}

impl Default for ColorScheme {
    fn default() -> Self {
        DEFAULT_INSTITUTION_COLORS.iter().fold(
            Self::new(DEFAULT_FALLBACK_COLOR, DEFAULT_CENTER_COLOR),
            |scheme, (institution, color)| scheme.with_color(*institution, *color),
        )
    }
}

/// Geometry and colors for the radial layout.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    /// Radius of the rank-0 ring
    pub base_radius: f64,

    /// Extra radius per rank
    pub radius_step: f64,

    pub colors: ColorScheme,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            base_radius: DEFAULT_BASE_RADIUS,
            radius_step: DEFAULT_RADIUS_STEP,
            colors: ColorScheme::default(),
        }
    }
}

impl LayoutConfig {
    /// Radius of the ring a paper with `rank` sits on.
    pub fn radius_for_rank(&self, rank: usize) -> f64 {
        self.base_radius + rank as f64 * self.radius_step
    }
}

/// The node standing for the query itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CenterNode {
    pub id: String,
    pub label: String,
    pub position: Position,
    pub color: String,
}

/// A positioned paper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutNode {
    /// `paper_{i}` where `i` is the display position
    pub id: String,

    /// Short text drawn next to the node
    pub label: String,

    /// Title, URL and institution on separate lines
    pub tooltip: String,

    pub position: Position,
    pub color: String,

    /// The record this node was built from
    pub record: PaperRecord,
}

/// Edge from the center node to one paper node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

/// Complete layout handed to the renderer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RadialGraph {
    pub center: CenterNode,
    pub nodes: Vec<LayoutNode>,
    pub edges: Vec<LayoutEdge>,
}

impl RadialGraph {
    /// Number of nodes including the center.
    pub fn node_count(&self) -> usize {
        self.nodes.len() + 1
    }

    /// Export as a flat list of Cytoscape elements for a `preset` layout.
    ///
    /// The center node comes first, followed by each paper node and its edge.
    pub fn to_cytoscape(&self) -> Vec<Value> {
        let mut elements = Vec::with_capacity(1 + self.nodes.len() * 2);
        elements.push(json!({
            "data": { "id": self.center.id, "label": self.center.label },
            "position": { "x": self.center.position.x, "y": self.center.position.y },
            "style": { "background-color": self.center.color },
        }));

        for (node, edge) in self.nodes.iter().zip(&self.edges) {
            elements.push(json!({
                "data": {
                    "id": node.id,
                    "label": node.label,
                    "title": node.tooltip,
                    "url": node.record.url,
                    "university": node.record.institution,
                    "class_label": node.record.class_label,
                    "rank": node.record.rank,
                },
                "position": { "x": node.position.x, "y": node.position.y },
                "style": { "background-color": node.color },
            }));
            elements.push(json!({
                "data": { "id": edge.id, "source": edge.source, "target": edge.target },
            }));
        }

        elements
    }
}

/// Lay out records around a center node labelled with the query text.
///
/// # Arguments
/// * `query_text` - Label of the center node
/// * `records` - Records in display order
/// * `config` - Geometry and colors
///
/// # Returns
/// A graph with the center at the origin, one node per record and one edge
/// per node. An empty `records` yields only the center.
pub fn layout(query_text: &str, records: Vec<PaperRecord>, config: &LayoutConfig) -> RadialGraph {
    let spacing = 2.0 * PI / records.len().max(1) as f64;

    let center = CenterNode {
        id: CENTER_ID.to_string(),
        label: query_text.to_string(),
        position: Position::ORIGIN,
        color: config.colors.center().to_string(),
    };

    let mut nodes = Vec::with_capacity(records.len());
    let mut edges = Vec::with_capacity(records.len());

    for (i, record) in records.into_iter().enumerate() {
        let id = format!("paper_{}", i);
        let position = Position::polar(config.radius_for_rank(record.rank), i as f64 * spacing);

        edges.push(LayoutEdge {
            id: format!("edge_{}_{}", CENTER_ID, id),
            source: CENTER_ID.to_string(),
            target: id.clone(),
        });
        nodes.push(LayoutNode {
            label: record.title.clone(),
            tooltip: format!("{}\n{}\n({})", record.title, record.url, record.institution),
            color: config.colors.color_for(&record.institution).to_string(),
            position,
            record,
            id,
        });
    }

    RadialGraph { center, nodes, edges }
}
