use hashbrown::HashSet;
use rand::prelude::*;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::*;

/// Public catalog index. The `limit` covers the whole listing so sampling
/// sees every entry in one request.
pub const DEFAULT_INDEX_URL: &str = "https://pokeapi.co/api/v2/pokemon?limit=1500";

/// Transport seam for [`CatalogClient`]. The web frontend backs this with the
/// browser's fetch; tests answer from canned JSON.
pub trait Fetch {
    async fn get_json(&self, url: &str) -> Result<serde_json::Value>;
}

#[derive(Clone, Debug, Deserialize)]
struct CatalogIndex {
    results: Vec<IndexEntry>,
}

#[derive(Clone, Debug, Deserialize)]
struct IndexEntry {
    name: String,
    url: String,
}

#[derive(Clone, Debug, Deserialize)]
struct EntryDetail {
    id: EntryId,
    sprites: Sprites,
}

#[derive(Clone, Debug, Deserialize)]
struct Sprites {
    front_default: Option<String>,
    other: Option<OtherSprites>,
}

#[derive(Clone, Debug, Deserialize)]
struct OtherSprites {
    #[serde(rename = "official-artwork")]
    official_artwork: Option<ArtworkSprites>,
}

#[derive(Clone, Debug, Deserialize)]
struct ArtworkSprites {
    front_default: Option<String>,
}

impl EntryDetail {
    /// Prefer the official artwork, fall back to the plain front sprite.
    fn artwork_url(&self) -> Option<&str> {
        self.sprites
            .other
            .as_ref()
            .and_then(|other| other.official_artwork.as_ref())
            .and_then(|art| art.front_default.as_deref())
            .or(self.sprites.front_default.as_deref())
    }
}

/// Fetches deduplicated random samples of card identities from the catalog.
#[derive(Clone, Debug)]
pub struct CatalogClient<F> {
    fetch: F,
    index_url: String,
}

impl<F: Fetch> CatalogClient<F> {
    pub fn new(fetch: F) -> Self {
        Self::with_index_url(fetch, DEFAULT_INDEX_URL)
    }

    pub fn with_index_url(fetch: F, index_url: impl Into<String>) -> Self {
        Self {
            fetch,
            index_url: index_url.into(),
        }
    }

    /// Collects `count` unique identities by uniform random sampling of the
    /// catalog index. Detail is fetched only for names not sampled before;
    /// entries without any usable artwork are discarded. Name is the dedup
    /// key, matching the upstream index.
    pub async fn fetch_random_identities<R: Rng + ?Sized>(
        &self,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<CardIdentity>> {
        let index: CatalogIndex = self.get(&self.index_url).await?;
        let entries = index.results;
        log::debug!("catalog index has {} entries", entries.len());
        if entries.len() < count {
            return Err(CatalogError::Exhausted {
                needed: count,
                got: entries.len(),
            });
        }

        let mut picked = Vec::with_capacity(count);
        let mut sampled: HashSet<&str> = HashSet::new();
        while picked.len() < count {
            if sampled.len() == entries.len() {
                // every entry was sampled and too many lacked artwork
                return Err(CatalogError::Exhausted {
                    needed: count,
                    got: picked.len(),
                });
            }

            let entry = &entries[rng.random_range(0..entries.len())];
            if !sampled.insert(&entry.name) {
                continue;
            }

            let detail: EntryDetail = self.get(&entry.url).await?;
            let Some(artwork_url) = detail.artwork_url() else {
                log::debug!("catalog entry {:?} has no artwork, skipping", entry.name);
                continue;
            };

            picked.push(CardIdentity {
                id: detail.id,
                name: entry.name.clone(),
                artwork_url: artwork_url.to_owned(),
            });
        }
        Ok(picked)
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let value = self.fetch.get_json(url).await?;
        serde_json::from_value(value).map_err(|err| CatalogError::Parse(err.to_string()))
    }
}
