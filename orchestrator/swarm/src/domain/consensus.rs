// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Consensus
//!
//! Single-process supermajority voting over the agents registered to the
//! domains a proposal concerns.
//!
//! A proposal is approved when the affirmative votes reach both
//! `⌈2n/3⌉` (with `n` voters) and the proposal's own `required_quorum`.
//! Zero voters always rejects.

use hive_core::domain::routing::DomainName;
use serde::{Deserialize, Serialize};

use super::agent::{Agent, AgentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProposalType {
    TaskAssignment,
    ResourceAllocation,
    QualityDecision,
}

impl ProposalType {
    /// Domains whose agents vote on this kind of proposal.
    pub fn domains(&self) -> &'static [DomainName] {
        match self {
            ProposalType::TaskAssignment => &[DomainName::Development, DomainName::Coordination],
            ProposalType::ResourceAllocation => &[DomainName::Coordination],
            ProposalType::QualityDecision => &[DomainName::Quality, DomainName::Security],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalType::TaskAssignment => "task-assignment",
            ProposalType::ResourceAllocation => "resource-allocation",
            ProposalType::QualityDecision => "quality-decision",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusProposal {
    pub proposal_type: ProposalType,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub required_quorum: usize,
}

impl ConsensusProposal {
    pub fn new(proposal_type: ProposalType, payload: serde_json::Value) -> Self {
        Self {
            proposal_type,
            payload,
            required_quorum: 0,
        }
    }

    pub fn with_quorum(mut self, required_quorum: usize) -> Self {
        self.required_quorum = required_quorum;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub agent_id: AgentId,
    pub approve: bool,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub approved: bool,
    pub votes: Vec<Vote>,
    pub approval_rate: f64,
    /// Affirmative votes needed; the stricter of supermajority and quorum.
    pub required_votes: usize,
    pub final_decision: serde_json::Value,
}

/// How a single agent judges a proposal.
pub trait VotePolicy: Send + Sync {
    fn cast(&self, agent: &Agent, proposal: &ConsensusProposal) -> Vote;
}

/// Approves whenever the voter itself is healthy.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthVotePolicy;

impl VotePolicy for HealthVotePolicy {
    fn cast(&self, agent: &Agent, _proposal: &ConsensusProposal) -> Vote {
        let approve = agent.is_healthy();
        Vote {
            agent_id: agent.id,
            approve,
            reasoning: if approve {
                format!("agent {} is healthy", agent.name)
            } else {
                format!("agent {} is in {:?} state", agent.name, agent.status)
            },
        }
    }
}

/// `⌈2n/3⌉`.
pub fn supermajority(voters: usize) -> usize {
    (2 * voters).div_ceil(3)
}

/// Count `votes` against `proposal` and merge the decision payload.
pub fn tally(proposal: &ConsensusProposal, votes: Vec<Vote>) -> ConsensusResult {
    let voters = votes.len();
    let approvals = votes.iter().filter(|vote| vote.approve).count();
    let required_votes = supermajority(voters).max(proposal.required_quorum);
    let approval_rate = if voters == 0 {
        0.0
    } else {
        approvals as f64 / voters as f64
    };
    let approved = voters > 0 && approvals >= required_votes;

    let mut final_decision = match &proposal.payload {
        serde_json::Value::Object(map) => serde_json::Value::Object(map.clone()),
        other => serde_json::json!({ "proposal": other }),
    };
    if let Some(map) = final_decision.as_object_mut() {
        map.insert("approval_rate".to_string(), serde_json::json!(approval_rate));
    }

    ConsensusResult {
        approved,
        votes,
        approval_rate,
        required_votes,
        final_decision,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::AgentStatus;
    use serde_json::json;

    fn votes(yes: usize, no: usize) -> Vec<Vote> {
        (0..yes)
            .map(|_| true)
            .chain((0..no).map(|_| false))
            .map(|approve| Vote {
                agent_id: AgentId::new(),
                approve,
                reasoning: String::new(),
            })
            .collect()
    }

    #[test]
    fn test_supermajority_thresholds() {
        assert_eq!(supermajority(0), 0);
        assert_eq!(supermajority(1), 1);
        assert_eq!(supermajority(3), 2);
        assert_eq!(supermajority(4), 3);
        assert_eq!(supermajority(5), 4);
        assert_eq!(supermajority(6), 4);
    }

    #[test]
    fn test_two_of_three_approves() {
        let proposal = ConsensusProposal::new(ProposalType::TaskAssignment, json!({"task": "t1"}));
        let result = tally(&proposal, votes(2, 1));
        assert!(result.approved);
        assert_eq!(result.required_votes, 2);
        assert_eq!(result.final_decision["task"], "t1");
        assert!((result.final_decision["approval_rate"].as_f64().unwrap() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_quorum_is_stricter() {
        let proposal = ConsensusProposal::new(ProposalType::ResourceAllocation, json!({})).with_quorum(3);
        let result = tally(&proposal, votes(2, 0));
        assert!(!result.approved);
        assert_eq!(result.required_votes, 3);
    }

    #[test]
    fn test_zero_voters_rejects() {
        let proposal = ConsensusProposal::new(ProposalType::QualityDecision, json!("ship"));
        let result = tally(&proposal, Vec::new());
        assert!(!result.approved);
        assert_eq!(result.final_decision, json!({"proposal": "ship", "approval_rate": 0.0}));
    }

    #[test]
    fn test_health_policy() {
        let proposal = ConsensusProposal::new(ProposalType::QualityDecision, json!({}));
        let mut agent = Agent::for_domain("qa", DomainName::Quality);
        assert!(HealthVotePolicy.cast(&agent, &proposal).approve);
        agent.status = AgentStatus::Error;
        assert!(!HealthVotePolicy.cast(&agent, &proposal).approve);
    }
}
