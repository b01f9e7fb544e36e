// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{borrow::Borrow, collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

use crate::err::{InvalidTagsSnafu, Result};

/// Identifier of a downloadable group of resources (an asset pack or an
/// on-demand resource tag).
///
/// Tags are case-sensitive and compared by exact value. The only thing a tag
/// cannot be is empty.
#[derive(
    Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(try_from = "String", into = "String")]
#[display("{_0}")]
pub struct Tag(String);

impl Tag {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return InvalidTagsSnafu {
                reason: "tag must not be empty",
            }
            .fail();
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:?}", self.0) }
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str { &self.0 }
}

impl Borrow<str> for Tag {
    fn borrow(&self) -> &str { &self.0 }
}

impl TryFrom<String> for Tag {
    type Error = crate::err::Error;

    fn try_from(value: String) -> Result<Self> { Self::new(value) }
}

impl TryFrom<&str> for Tag {
    type Error = crate::err::Error;

    fn try_from(value: &str) -> Result<Self> { Self::new(value) }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self { tag.0 }
}

/// A canonical, non-empty set of tags.
///
/// Duplicates collapse and iteration is always in sorted order, so two
/// requests naming the same tags in a different order produce equal sets.
/// The set itself (not a joined string) is the identity used to key
/// reservations, which keeps tags containing `,` from colliding.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TagSet(BTreeSet<Tag>);

impl TagSet {
    /// Build a set from caller-supplied strings, rejecting an empty input or
    /// an empty tag.
    pub fn new<I, S>(tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags = tags
            .into_iter()
            .map(|tag| Tag::new(tag.as_ref()))
            .collect::<Result<BTreeSet<_>>>()?;
        if tags.is_empty() {
            return InvalidTagsSnafu {
                reason: "at least one tag is required",
            }
            .fail();
        }
        Ok(Self(tags))
    }

    /// Build a set from already validated tags. `None` when `tags` is empty.
    pub fn from_tags(tags: impl IntoIterator<Item = Tag>) -> Option<Self> {
        let tags: BTreeSet<_> = tags.into_iter().collect();
        (!tags.is_empty()).then_some(Self(tags))
    }

    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Always `false`; present for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    #[must_use]
    pub fn contains(&self, tag: &str) -> bool { self.0.contains(tag) }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> { self.0.iter() }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for tag in &self.0 {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{tag}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.iter()).finish()
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type IntoIter = std::collections::btree_set::Iter<'a, Tag>;
    type Item = &'a Tag;

    fn into_iter(self) -> Self::IntoIter { self.0.iter() }
}

impl IntoIterator for TagSet {
    type IntoIter = std::collections::btree_set::IntoIter<Tag>;
    type Item = Tag;

    fn into_iter(self) -> Self::IntoIter { self.0.into_iter() }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn duplicates_collapse_and_order_is_canonical() {
        let a = TagSet::new(["textures", "levels", "textures"]).unwrap();
        let b = TagSet::new(["levels", "textures"]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.to_string(), "levels, textures");
    }

    #[test]
    fn tags_are_case_sensitive() {
        let set = TagSet::new(["Level1", "level1"]).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains("Level1"));
        assert!(!set.contains("LEVEL1"));
    }

    #[test]
    fn separator_characters_do_not_collide() {
        // Joined with "," both would read "a,b".
        let joined = TagSet::new(["a,b"]).unwrap();
        let split = TagSet::new(["a", "b"]).unwrap();
        assert_ne!(joined, split);

        let keys: HashSet<_> = [joined, split].into_iter().collect();
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn empty_inputs_are_rejected() {
        assert!(TagSet::new(Vec::<String>::new()).is_err());
        assert!(TagSet::new(["ok", ""]).is_err());
        assert!(TagSet::from_tags(Vec::new()).is_none());
    }

    #[test]
    fn tag_serde_validates() {
        let tag: Tag = serde_json::from_str("\"kichi\"").unwrap();
        assert_eq!(tag.as_str(), "kichi");
        assert!(serde_json::from_str::<Tag>("\"\"").is_err());
    }
}
