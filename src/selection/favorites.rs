use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The ids of a user's saved selections, in the order they were saved. Each id appears once.
/// Removing an id only unlinks the selection from the user; the selection itself lives on.
#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq, Eq)]
#[serde(from = "Vec<Uuid>", into = "Vec<Uuid>")]
pub struct Favorites(Vec<Uuid>);

impl Favorites {
    /// Append the id unless it's already saved. Returns whether anything changed.
    pub fn add(&mut self, id: Uuid) -> bool {
        if self.contains(id) {
            return false;
        }
        self.0.push(id);
        true
    }

    /// Returns whether anything changed.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.0.len();
        self.0.retain(|saved| *saved != id);
        self.0.len() != before
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.0.contains(&id)
    }

    pub fn into_inner(self) -> Vec<Uuid> {
        self.0
    }
}

impl From<Vec<Uuid>> for Favorites {
    /// Duplicates are dropped, keeping the first occurrence.
    fn from(ids: Vec<Uuid>) -> Self {
        let mut favorites = Favorites(Vec::with_capacity(ids.len()));
        for id in ids {
            favorites.add(id);
        }
        favorites
    }
}

impl From<Favorites> for Vec<Uuid> {
    fn from(favorites: Favorites) -> Self {
        favorites.0
    }
}
