//! ICMM: the scenario/worldstate-tree service (a cids REST API).
//!
//! World-states are addressed as `<endpoint>/<domain>.worldstates/<id>`.
//! Indicator values and KPIs are published as data items attached to the
//! world-state's `iccdata`.

mod client;

pub use client::{parse_simulated_time, IcmmClient};

use crate::error::IndicatorError;
use crate::http::trailing_id;
use reqwest::Url;
use serde::Deserialize;
use std::fmt;

/// A parsed ICMM world-state URL.
#[derive(Debug, Clone, PartialEq)]
pub struct IcmmRef {
    pub endpoint: String,
    pub domain: String,
    pub id: u64,
}

impl IcmmRef {
    /// Splits `http://host/icmm_api/CRISMA.worldstates/1?level=4` into
    /// endpoint `http://host/icmm_api`, domain `CRISMA` and id `1`.
    pub fn parse(url: &str) -> Result<Self, IndicatorError> {
        let invalid = || IndicatorError::InvalidIcmmRef(url.to_string());
        let parsed = Url::parse(url.trim()).map_err(|_| invalid())?;
        if !parsed.has_host() {
            return Err(invalid());
        }
        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        let (last, rest) = segments.split_last().ok_or_else(invalid)?;
        let id: u64 = last.parse().map_err(|_| invalid())?;
        let (class_segment, prefix) = rest.split_last().ok_or_else(invalid)?;
        let (domain, class) = class_segment.split_once('.').ok_or_else(invalid)?;
        if domain.is_empty() || !class.eq_ignore_ascii_case("worldstates") {
            return Err(invalid());
        }

        let mut endpoint = parsed.origin().ascii_serialization();
        for segment in prefix {
            endpoint.push('/');
            endpoint.push_str(segment);
        }

        Ok(Self {
            endpoint,
            domain: domain.to_string(),
            id,
        })
    }

    pub fn url(&self) -> String {
        format!("{}/{}.worldstates/{}", self.endpoint, self.domain, self.id)
    }
}

impl fmt::Display for IcmmRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

/// A cids object reference: either a full object carrying `id`/`$self`
/// or a deduplicated `{"$ref": "/CRISMA.worldstates/3"}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectRef {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(rename = "$ref", default)]
    pub reference: Option<String>,
    #[serde(rename = "$self", default)]
    pub self_ref: Option<String>,
}

impl ObjectRef {
    pub fn id(&self) -> Option<u64> {
        self.id
            .or_else(|| self.self_ref.as_deref().and_then(trailing_id))
            .or_else(|| self.reference.as_deref().and_then(trailing_id))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub key: Option<String>,
}

fn has_category(categories: &[Category], key: &str) -> bool {
    categories
        .iter()
        .any(|c| c.key.as_deref().map(|k| k.eq_ignore_ascii_case(key)).unwrap_or(false))
}

/// A data item attached to a world-state (`worldstatedata` or `iccdata`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataItem {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(rename = "$self", default)]
    pub self_ref: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub actualaccessinfocontenttype: Option<String>,
    #[serde(default)]
    pub actualaccessinfo: Option<String>,
}

impl DataItem {
    pub fn id(&self) -> Option<u64> {
        self.id
            .or_else(|| self.self_ref.as_deref().and_then(trailing_id))
    }

    pub fn has_category(&self, key: &str) -> bool {
        has_category(&self.categories, key)
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }
}

/// The parts of an ICMM world-state record the indicators use.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorldStateRecord {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub parentworldstate: Option<ObjectRef>,
    #[serde(default)]
    pub worldstatedata: Vec<DataItem>,
    #[serde(default)]
    pub iccdata: Vec<DataItem>,
    #[serde(rename = "simulatedTime", default)]
    pub simulated_time: Option<String>,
}

impl WorldStateRecord {
    pub fn has_category(&self, key: &str) -> bool {
        has_category(&self.categories, key)
    }

    pub fn parent_id(&self) -> Option<u64> {
        self.parentworldstate.as_ref().and_then(ObjectRef::id)
    }

    /// URL stored in the worldstate data item named (or categorised) `name`.
    pub fn data_reference(&self, name: &str) -> Option<&str> {
        self.worldstatedata
            .iter()
            .find(|item| item.is_named(name) || item.has_category(name))
            .and_then(|item| item.actualaccessinfo.as_deref())
            .filter(|url| !url.trim().is_empty())
    }

    /// Previously published ICC data item with this name and category.
    pub fn icc_item(&self, name: &str, category: &str) -> Option<&DataItem> {
        self.iccdata
            .iter()
            .find(|item| item.is_named(name) && item.has_category(category))
    }
}
