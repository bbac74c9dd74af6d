use serde::{Deserialize, Deserializer, Serialize};

/// One entry of the "For You" feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaperSummary {
    #[serde(rename = "mag_id")]
    pub id: String,
    pub title: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedPage {
    #[serde(default)]
    pub papers: Vec<PaperSummary>,
    #[serde(default)]
    pub count: usize,
}

/// Paper metadata looked up by id. Every field except the id may be absent
/// when the server simply has no value for it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaperDetail {
    #[serde(rename = "mag_id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "doi_url", default)]
    pub external_link_url: Option<String>,
    #[serde(rename = "abstract", default)]
    pub abstract_text: Option<String>,
}

/// A paper positioned in the precomputed 2D projection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayoutPoint {
    #[serde(deserialize_with = "string_or_integer")]
    pub node_id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub x: f64,
    pub y: f64,
}

impl LayoutPoint {
    pub fn new(node_id: impl Into<String>, title: Option<&str>, x: f64, y: f64) -> Self {
        Self { node_id: node_id.into(), title: title.map(str::to_string), x, y }
    }
}

// History order is chronological and must be kept; recommendations are unordered.
pub type HistoryNode = LayoutPoint;
pub type RecommendationNode = LayoutPoint;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TsneLayout {
    #[serde(default)]
    pub history: Vec<HistoryNode>,
    #[serde(default)]
    pub recommendations: Vec<RecommendationNode>,
}

impl TsneLayout {
    pub fn node_count(&self) -> usize {
        self.history.len() + self.recommendations.len()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClickOutcome {
    pub ok: bool,
    #[serde(default)]
    pub history: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeHistory {
    pub node_id: String,
    #[serde(default)]
    pub history: Vec<String>,
}

#[derive(Serialize)]
pub(crate) struct ClickBody<'a> {
    pub mag_id: &'a str,
}

// Node ids are integers on the server side and are not always quoted.
fn string_or_integer<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Text(String),
        Int(i64),
    }
    Ok(match IdRepr::deserialize(deserializer)? {
        IdRepr::Text(s) => s,
        IdRepr::Int(n) => n.to_string(),
    })
}
