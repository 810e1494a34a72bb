use serde::{Deserialize, Serialize};

pub use crate::draft::{Id, Presentation};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub id: Id,
    pub suggestions: Presentation,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Articles {
    pub articles: Vec<String>,
}
