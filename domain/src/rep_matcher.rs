//! Maps the participants of a call to the one active sales rep who owns it.

use crate::error::Error;
use crate::store::RepDirectory;
use crate::Id;
use entity_api::json_types::Participant;
use entity_api::sales_reps;
use log::*;
use serde::Serialize;
use service::config::RepMatchPolicy;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepMatch {
    pub matched: bool,
    pub rep_id: Option<Id>,
    pub rep_name: Option<String>,
    pub rep_email: Option<String>,
    /// How many active reps attended the call.
    pub candidates: usize,
    #[serde(skip)]
    pub rep: Option<sales_reps::Model>,
}

impl RepMatch {
    fn unmatched(candidates: usize) -> Self {
        Self {
            candidates,
            ..Self::default()
        }
    }

    fn matched(rep: sales_reps::Model, candidates: usize) -> Self {
        Self {
            matched: true,
            rep_id: Some(rep.id),
            rep_name: Some(rep.name.clone()),
            rep_email: Some(rep.email.clone()),
            candidates,
            rep: Some(rep),
        }
    }
}

/// Lower-cased, de-duplicated, non-empty participant emails in participant order.
pub fn normalize_emails(participants: &[Participant]) -> Vec<String> {
    let mut seen = HashSet::new();
    participants
        .iter()
        .map(Participant::normalized_email)
        .filter(|email| !email.is_empty() && seen.insert(email.clone()))
        .collect()
}

pub struct RepMatcher {
    directory: Arc<dyn RepDirectory>,
    policy: RepMatchPolicy,
}

impl RepMatcher {
    pub fn new(directory: Arc<dyn RepDirectory>, policy: RepMatchPolicy) -> Self {
        Self { directory, policy }
    }

    pub fn policy(&self) -> RepMatchPolicy {
        self.policy
    }

    pub async fn match_sales_rep(&self, participants: &[Participant]) -> Result<RepMatch, Error> {
        let emails = normalize_emails(participants);
        if emails.is_empty() {
            debug!("No participant emails to match against");
            return Ok(RepMatch::unmatched(0));
        }

        let reps = self.directory.find_active_reps_by_emails(&emails).await?;
        let candidates = reps.len();

        let chosen = match self.policy {
            RepMatchPolicy::LookupOrder => reps.into_iter().next(),
            RepMatchPolicy::ParticipantOrder => emails
                .iter()
                .find_map(|email| reps.iter().find(|rep| &rep.email == email).cloned()),
            RepMatchPolicy::UniqueOnly if candidates == 1 => reps.into_iter().next(),
            RepMatchPolicy::UniqueOnly => None,
        };

        if candidates > 1 {
            warn!(
                "{candidates} active reps attended the same call; resolved with policy {} to {:?}",
                self.policy,
                chosen.as_ref().map(|rep| rep.email.as_str())
            );
        }

        Ok(match chosen {
            Some(rep) => {
                debug!("Matched call to rep {} ({})", rep.name, rep.email);
                RepMatch::matched(rep, candidates)
            }
            None => RepMatch::unmatched(candidates),
        })
    }

    /// The participants who are not active reps, i.e. the customer side of the call.
    pub async fn client_participants(
        &self,
        participants: &[Participant],
    ) -> Result<Vec<Participant>, Error> {
        let emails = normalize_emails(participants);
        let rep_emails: HashSet<String> = self
            .directory
            .find_active_reps_by_emails(&emails)
            .await?
            .into_iter()
            .map(|rep| rep.email)
            .collect();

        Ok(participants
            .iter()
            .filter(|participant| !rep_emails.contains(&participant.normalized_email()))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn participants(emails: &[&str]) -> Vec<Participant> {
        emails
            .iter()
            .map(|email| Participant::new(email.split('@').next().unwrap_or(""), *email))
            .collect()
    }

    #[tokio::test]
    async fn matches_active_rep_case_insensitively() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        let rep = store.add_rep("Rep", "rep@x.com", &[]);
        let matcher = RepMatcher::new(store.clone(), RepMatchPolicy::LookupOrder);

        let result = matcher
            .match_sales_rep(&participants(&["REP@x.com ", "lead@y.com"]))
            .await?;

        assert!(result.matched);
        assert_eq!(result.rep_id, Some(rep.id));
        assert_eq!(result.rep_email.as_deref(), Some("rep@x.com"));
        Ok(())
    }

    #[tokio::test]
    async fn archived_rep_does_not_match() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        let rep = store.add_rep("Rep", "rep@x.com", &[]);
        store.archive_rep(rep.id);
        let matcher = RepMatcher::new(store.clone(), RepMatchPolicy::LookupOrder);

        let result = matcher
            .match_sales_rep(&participants(&["rep@x.com", "lead@y.com"]))
            .await?;

        assert!(!result.matched);
        assert_eq!(result.rep_id, None);
        Ok(())
    }

    #[tokio::test]
    async fn no_participants_is_unmatched() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        store.add_rep("Rep", "rep@x.com", &[]);
        let matcher = RepMatcher::new(store, RepMatchPolicy::LookupOrder);

        assert!(!matcher.match_sales_rep(&[]).await?.matched);
        Ok(())
    }

    #[tokio::test]
    async fn tie_break_follows_policy() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        let first = store.add_rep("First", "first@x.com", &[]);
        let second = store.add_rep("Second", "second@x.com", &[]);
        let attendees = participants(&["second@x.com", "first@x.com"]);

        let lookup = RepMatcher::new(store.clone(), RepMatchPolicy::LookupOrder)
            .match_sales_rep(&attendees)
            .await?;
        assert_eq!(lookup.rep_id, Some(first.id));
        assert_eq!(lookup.candidates, 2);

        let by_participant = RepMatcher::new(store.clone(), RepMatchPolicy::ParticipantOrder)
            .match_sales_rep(&attendees)
            .await?;
        assert_eq!(by_participant.rep_id, Some(second.id));

        let unique = RepMatcher::new(store, RepMatchPolicy::UniqueOnly)
            .match_sales_rep(&attendees)
            .await?;
        assert!(!unique.matched);
        assert_eq!(unique.candidates, 2);
        Ok(())
    }

    #[tokio::test]
    async fn client_participants_excludes_reps() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        store.add_rep("Rep", "rep@x.com", &[]);
        let matcher = RepMatcher::new(store, RepMatchPolicy::LookupOrder);

        let clients = matcher
            .client_participants(&participants(&["Rep@X.com", "lead@y.com"]))
            .await?;

        assert_eq!(clients, participants(&["lead@y.com"]));
        Ok(())
    }

    #[test]
    fn normalize_emails_dedupes_and_drops_blanks() {
        let emails = normalize_emails(&participants(&["A@x.com", "a@x.com ", " ", "b@y.com"]));

        assert_eq!(emails, vec!["a@x.com".to_string(), "b@y.com".to_string()]);
    }
}
