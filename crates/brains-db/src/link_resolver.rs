//! Link resolution: mapping typed `[[...]]` references to card ids.
//!
//! The resolver is stateless beyond the read-only lookups it performs
//! through a [`BrainDirectory`]; hold one for as long as the directory
//! lives, or build one per call.

use uuid::Uuid;

use brains_core::{
    BrainDirectory, RawLink, ResolvedCardLink, ResolvedLink, Result, TypedLink,
};

/// Resolves typed links against brains and cards.
pub struct LinkResolver<D: BrainDirectory> {
    directory: D,
}

impl<D: BrainDirectory> LinkResolver<D> {
    pub fn new(directory: D) -> Self {
        Self { directory }
    }

    /// The directory this resolver reads through.
    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Resolve one typed link from the perspective of a source card.
    ///
    /// Lookup misses return `Ok` with `is_valid = false` and a readable
    /// reason; only storage failures surface as `Err`.
    pub async fn resolve(
        &self,
        link: &TypedLink,
        source_brain_id: Uuid,
        source_owner_id: Uuid,
    ) -> Result<ResolvedLink> {
        match link {
            // Versioned links currently resolve like simple links: the
            // version is classified and recorded in the raw text, but there
            // is no revision store to select against.
            TypedLink::Simple { target_title }
            | TypedLink::Versioned { target_title, .. } => {
                match self
                    .directory
                    .find_card_by_brain_and_title(source_brain_id, target_title)
                    .await?
                {
                    Some(card) => Ok(ResolvedLink::valid(card.id, card.brain_id)),
                    None => Ok(ResolvedLink::broken(format!(
                        "no card titled '{target_title}' in this brain"
                    ))),
                }
            }
            TypedLink::CrossBrain {
                brain_name,
                target_title,
            } => {
                let Some(brain) = self
                    .directory
                    .find_brain_by_owner_and_name(source_owner_id, brain_name)
                    .await?
                else {
                    return Ok(ResolvedLink::broken(format!(
                        "no brain named '{brain_name}' for this owner"
                    )));
                };

                match self
                    .directory
                    .find_card_by_brain_and_title(brain.id, target_title)
                    .await?
                {
                    Some(card) => Ok(ResolvedLink::valid(card.id, card.brain_id)),
                    None => Ok(ResolvedLink::broken(format!(
                        "no card titled '{target_title}' in brain '{brain_name}'"
                    ))),
                }
            }
        }
    }

    /// Resolve a batch of extracted occurrences in document order.
    pub async fn resolve_all(
        &self,
        links: &[(RawLink, TypedLink)],
        source_brain_id: Uuid,
        source_owner_id: Uuid,
    ) -> Result<Vec<ResolvedCardLink>> {
        let mut resolved = Vec::with_capacity(links.len());
        for (raw, typed) in links {
            let resolution = self.resolve(typed, source_brain_id, source_owner_id).await?;
            resolved.push(ResolvedCardLink {
                link_text: raw.text.clone(),
                link_offset: raw.start_offset as i32,
                resolution,
            });
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use brains_core::{new_v7, Brain, Card};
    use chrono::Utc;
    use std::collections::HashMap;

    /// In-memory directory with a fixed set of brains and titled cards.
    struct FixedDirectory {
        brains: HashMap<(Uuid, String), Brain>,
        cards: HashMap<(Uuid, String), Card>,
    }

    impl FixedDirectory {
        fn new() -> Self {
            Self {
                brains: HashMap::new(),
                cards: HashMap::new(),
            }
        }

        fn with_brain(mut self, owner_id: Uuid, name: &str) -> (Self, Uuid) {
            let brain = Brain {
                id: new_v7(),
                owner_id,
                name: name.to_string(),
                created_at_utc: Utc::now(),
            };
            let id = brain.id;
            self.brains.insert((owner_id, name.to_string()), brain);
            (self, id)
        }

        fn with_card(mut self, brain_id: Uuid, title: &str) -> (Self, Uuid) {
            let card = Card {
                id: new_v7(),
                brain_id,
                title: Some(title.to_string()),
                content: String::new(),
                content_hash: String::new(),
                size_bytes: 0,
                created_at_utc: Utc::now(),
                updated_at_utc: Utc::now(),
                deleted_at: None,
            };
            let id = card.id;
            self.cards.insert((brain_id, title.to_string()), card);
            (self, id)
        }
    }

    #[async_trait]
    impl BrainDirectory for FixedDirectory {
        async fn find_brain_by_owner_and_name(
            &self,
            owner_id: Uuid,
            name: &str,
        ) -> Result<Option<Brain>> {
            Ok(self.brains.get(&(owner_id, name.to_string())).cloned())
        }

        async fn find_card_by_brain_and_title(
            &self,
            brain_id: Uuid,
            title: &str,
        ) -> Result<Option<Card>> {
            Ok(self.cards.get(&(brain_id, title.to_string())).cloned())
        }

        async fn card(&self, card_id: Uuid) -> Result<Option<Card>> {
            Ok(self.cards.values().find(|c| c.id == card_id).cloned())
        }
    }

    #[tokio::test]
    async fn test_simple_link_resolves_in_source_brain() {
        let owner = new_v7();
        let (dir, brain_id) = FixedDirectory::new().with_brain(owner, "main");
        let (dir, card_id) = dir.with_card(brain_id, "Target");

        let resolver = LinkResolver::new(dir);
        let resolved = resolver
            .resolve(
                &TypedLink::Simple {
                    target_title: "Target".to_string(),
                },
                brain_id,
                owner,
            )
            .await
            .unwrap();

        assert!(resolved.is_valid);
        assert_eq!(resolved.target_card_id, Some(card_id));
        assert_eq!(resolved.target_brain_id, Some(brain_id));
    }

    #[tokio::test]
    async fn test_versioned_resolves_like_simple() {
        let owner = new_v7();
        let (dir, brain_id) = FixedDirectory::new().with_brain(owner, "main");
        let (dir, card_id) = dir.with_card(brain_id, "Target");

        let resolver = LinkResolver::new(dir);
        let resolved = resolver
            .resolve(
                &TypedLink::Versioned {
                    target_title: "Target".to_string(),
                    version: 7,
                },
                brain_id,
                owner,
            )
            .await
            .unwrap();

        assert!(resolved.is_valid);
        assert_eq!(resolved.target_card_id, Some(card_id));
    }

    #[tokio::test]
    async fn test_missing_title_is_broken_not_err() {
        let owner = new_v7();
        let (dir, brain_id) = FixedDirectory::new().with_brain(owner, "main");

        let resolver = LinkResolver::new(dir);
        let resolved = resolver
            .resolve(
                &TypedLink::Simple {
                    target_title: "Nowhere".to_string(),
                },
                brain_id,
                owner,
            )
            .await
            .unwrap();

        assert!(!resolved.is_valid);
        assert!(resolved.target_card_id.is_none());
        assert!(resolved.error.unwrap().contains("Nowhere"));
    }

    #[tokio::test]
    async fn test_cross_brain_resolution() {
        let owner = new_v7();
        let (dir, home_id) = FixedDirectory::new().with_brain(owner, "home");
        let (dir, work_id) = dir.with_brain(owner, "work");
        let (dir, card_id) = dir.with_card(work_id, "Roadmap");

        let resolver = LinkResolver::new(dir);
        let resolved = resolver
            .resolve(
                &TypedLink::CrossBrain {
                    brain_name: "work".to_string(),
                    target_title: "Roadmap".to_string(),
                },
                home_id,
                owner,
            )
            .await
            .unwrap();

        assert!(resolved.is_valid);
        assert_eq!(resolved.target_card_id, Some(card_id));
        assert_eq!(resolved.target_brain_id, Some(work_id));
    }

    #[tokio::test]
    async fn test_cross_brain_unknown_brain() {
        let owner = new_v7();
        let (dir, home_id) = FixedDirectory::new().with_brain(owner, "home");

        let resolver = LinkResolver::new(dir);
        let resolved = resolver
            .resolve(
                &TypedLink::CrossBrain {
                    brain_name: "missing".to_string(),
                    target_title: "Anything".to_string(),
                },
                home_id,
                owner,
            )
            .await
            .unwrap();

        assert!(!resolved.is_valid);
        assert!(resolved.error.unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn test_cross_brain_known_brain_unknown_card() {
        let owner = new_v7();
        let (dir, home_id) = FixedDirectory::new().with_brain(owner, "home");
        let (dir, _work_id) = dir.with_brain(owner, "work");

        let resolver = LinkResolver::new(dir);
        let resolved = resolver
            .resolve(
                &TypedLink::CrossBrain {
                    brain_name: "work".to_string(),
                    target_title: "Ghost".to_string(),
                },
                home_id,
                owner,
            )
            .await
            .unwrap();

        assert!(!resolved.is_valid);
        let error = resolved.error.unwrap();
        assert!(error.contains("Ghost"));
        assert!(error.contains("work"));
    }

    #[tokio::test]
    async fn test_directory_accessor_fetches_cards_by_id() {
        let owner = new_v7();
        let (dir, brain_id) = FixedDirectory::new().with_brain(owner, "main");
        let (dir, card_id) = dir.with_card(brain_id, "Target");

        let resolver = LinkResolver::new(dir);
        let card = resolver
            .directory()
            .card(card_id)
            .await
            .unwrap()
            .expect("card exists");
        assert_eq!(card.id, card_id);
        assert_eq!(card.title.as_deref(), Some("Target"));
    }

    #[tokio::test]
    async fn test_resolve_all_preserves_document_order() {
        let owner = new_v7();
        let (dir, brain_id) = FixedDirectory::new().with_brain(owner, "main");
        let (dir, _) = dir.with_card(brain_id, "X");

        let resolver = LinkResolver::new(dir);
        let links = brains_core::extract_typed_links("[[X]] then [[Missing]]");
        let resolved = resolver
            .resolve_all(&links, brain_id, owner)
            .await
            .unwrap();

        assert_eq!(resolved.len(), 2);
        assert!(resolved[0].resolution.is_valid);
        assert!(!resolved[1].resolution.is_valid);
        assert!(resolved[0].link_offset < resolved[1].link_offset);
    }
}
