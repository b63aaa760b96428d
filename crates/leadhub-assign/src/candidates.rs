// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use leadhub_core::{Agent, AgentDirectory, DistributionSettings, LeadhubError};

/// Where the candidate pool for one decision comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateSource {
    /// Explicit participant ids from the distribution settings.
    Participants(Vec<String>),
    /// Every active agent holding this role.
    Role(String),
}

impl CandidateSource {
    /// Participants when configured, otherwise discovery by `role`.
    pub fn for_settings(settings: &DistributionSettings, role: &str) -> Self {
        if settings.participants.is_empty() {
            CandidateSource::Role(role.to_string())
        } else {
            CandidateSource::Participants(settings.participants.clone())
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CandidateSource::Participants(_) => "participants",
            CandidateSource::Role(_) => "role",
        }
    }

    /// Active agents in this pool, ordered by id.
    pub async fn discover<D>(&self, directory: &D) -> Result<Vec<Agent>, LeadhubError>
    where
        D: AgentDirectory + ?Sized,
    {
        match self {
            CandidateSource::Participants(ids) => directory.list_active_agents_by_ids(ids).await,
            CandidateSource::Role(role) => directory.list_active_agents_by_role(role).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadhub_core::DistributionMode;

    #[test]
    fn empty_participants_fall_back_to_role() {
        let settings = DistributionSettings {
            enabled: true,
            mode: DistributionMode::Auto,
            ..DistributionSettings::default()
        };
        assert_eq!(
            CandidateSource::for_settings(&settings, "sales"),
            CandidateSource::Role("sales".into())
        );

        let settings = DistributionSettings {
            participants: vec!["u2".into(), "u1".into()],
            ..settings
        };
        let source = CandidateSource::for_settings(&settings, "sales");
        assert_eq!(
            source,
            CandidateSource::Participants(vec!["u2".into(), "u1".into()])
        );
        assert_eq!(source.label(), "participants");
    }
}
