//! Wire types for the diagnostic and simulation REST contracts.
//!
//! The server is the trust boundary: every value here is consumed as
//! returned, never locally recomputed. Field names follow the JSON wire
//! format (camelCase) via serde renames.

use serde::{Deserialize, Serialize};

/// Coarse proficiency banding assigned by the diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl SkillLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillLevel::Beginner => "beginner",
            SkillLevel::Intermediate => "intermediate",
            SkillLevel::Advanced => "advanced",
        }
    }
}

/// Per-competency scores, each on the 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillScores {
    pub communication: f32,
    pub negotiation: f32,
    pub objection_handling: f32,
    pub relationship_building: f32,
    pub product_knowledge: f32,
    pub closing_technique: f32,
}

/// Scored breakdown produced by a completed diagnostic.
///
/// Stored wholesale on every successful fetch or completion; never
/// merged field-by-field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillReport {
    pub level: SkillLevel,
    pub overall_score: f32,
    pub skill_scores: SkillScores,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub knowledge_gaps: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommended_course_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommended_topics: Vec<String>,
}

/// `GET diagnostic/status` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticStatusOutput {
    pub needs_diagnostic: bool,
    pub last_diagnostic_at: Option<i64>,
    pub hours_since_last: Option<f32>,
    pub current_report: Option<SkillReport>,
}

/// Outcome of asking the server to begin a diagnostic attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStatus {
    Started,
    SkippedRecent,
}

/// `POST diagnostic/trigger` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDiagnosticOutput {
    pub diagnostic_session_id: String,
    pub status: TriggerStatus,
    #[serde(default)]
    pub last_diagnostic_at: Option<i64>,
}

/// `POST diagnostic/complete` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteDiagnosticInput {
    pub diagnostic_session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulation_session_id: Option<String>,
}

/// `POST diagnostic/complete` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteDiagnosticOutput {
    pub report: SkillReport,
    pub improvement: f32,
}

/// Behavioral profile of the simulated conversational counterpart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientPersona {
    pub name: String,
    pub personality: String,
    #[serde(default)]
    pub motivations: Vec<String>,
    #[serde(default)]
    pub objections: Vec<String>,
}

/// Sentiment the server attributes to the client persona's latest turn.
///
/// Unrecognized wire values fall back to `Neutral`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl From<String> for Sentiment {
    fn from(value: String) -> Self {
        match value.as_str() {
            "positive" => Sentiment::Positive,
            "negative" => Sentiment::Negative,
            _ => Sentiment::Neutral,
        }
    }
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }
}

/// Negotiation phase of the simulated conversation.
///
/// Advanced only by server responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationPhase {
    #[default]
    Opening,
    Discovery,
    Presenting,
    Negotiating,
    Closing,
    Ended,
}

impl ConversationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationPhase::Opening => "opening",
            ConversationPhase::Discovery => "discovery",
            ConversationPhase::Presenting => "presenting",
            ConversationPhase::Negotiating => "negotiating",
            ConversationPhase::Closing => "closing",
            ConversationPhase::Ended => "ended",
        }
    }
}

/// Terminal result of a practice conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationOutcome {
    Success,
    Failure,
    Timeout,
    Abandoned,
}

impl SimulationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationOutcome::Success => "success",
            SimulationOutcome::Failure => "failure",
            SimulationOutcome::Timeout => "timeout",
            SimulationOutcome::Abandoned => "abandoned",
        }
    }
}

/// `POST simulations/start` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSimulationInput {
    pub scenario_type: String,
    pub difficulty_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_persona_config: Option<serde_json::Value>,
    pub record_session: bool,
}

/// `POST simulations/start` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSimulationOutput {
    pub session_id: String,
    pub persona: ClientPersona,
    /// First turn of the conversation, authored by the client persona.
    pub opening_message: String,
    pub ready: bool,
    /// Synthesized speech for the opening turn, inline base64.
    #[serde(default)]
    pub opening_audio_base64: Option<String>,
}

/// `POST simulations/{id}/message` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationMessageInput {
    pub message: String,
    pub message_type: String,
}

/// `POST simulations/{id}/message` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationMessageOutput {
    pub client_reply: String,
    pub sentiment: Sentiment,
    #[serde(default)]
    pub detected_intent: Option<String>,
    pub conversation_state: ConversationPhase,
    pub turn_number: u32,
    pub elapsed_time_seconds: u64,
    #[serde(default)]
    pub hints: Vec<String>,
    /// Synthesized speech for the reply, inline base64.
    #[serde(default)]
    pub audio_base64: Option<String>,
}

/// `POST simulations/{id}/end` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSimulationInput {
    pub end_reason: String,
}

/// `POST simulations/{id}/end` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSimulationOutput {
    pub outcome: SimulationOutcome,
    pub preliminary_score: f32,
}

/// `GET simulations/{id}/analysis` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationAnalysisOutput {
    pub overall_score: f32,
    #[serde(default)]
    pub skill_scores: Option<SkillScores>,
    pub summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvement_areas: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skill_report_round_trips_wire_names() {
        let json = r#"{
            "level": "intermediate",
            "overallScore": 62.0,
            "skillScores": {
                "communication": 70.0,
                "negotiation": 55.0,
                "objectionHandling": 60.0,
                "relationshipBuilding": 65.0,
                "productKnowledge": 58.0,
                "closingTechnique": 64.0
            },
            "strengths": ["active listening"],
            "weaknesses": ["price anchoring"],
            "knowledgeGaps": ["enterprise tier"]
        }"#;

        let report: SkillReport = serde_json::from_str(json).expect("report should decode");
        assert_eq!(report.level, SkillLevel::Intermediate);
        assert_eq!(report.overall_score, 62.0);
        assert_eq!(report.skill_scores.objection_handling, 60.0);
        assert!(report.recommended_course_ids.is_empty());

        let encoded = serde_json::to_value(&report).expect("report should encode");
        assert_eq!(encoded["overallScore"], 62.0);
        assert_eq!(encoded["skillScores"]["closingTechnique"], 64.0);
    }

    #[test]
    fn trigger_status_uses_snake_case() {
        let output: TriggerDiagnosticOutput = serde_json::from_str(
            r#"{"diagnosticSessionId": "d1", "status": "skipped_recent", "lastDiagnosticAt": 1700000000000}"#,
        )
        .expect("trigger output should decode");
        assert_eq!(output.status, TriggerStatus::SkippedRecent);
        assert_eq!(output.last_diagnostic_at, Some(1_700_000_000_000));
    }

    #[test]
    fn unknown_sentiment_maps_to_neutral() {
        let output: SimulationMessageOutput = serde_json::from_str(
            r#"{
                "clientReply": "Tell me more.",
                "sentiment": "intrigued",
                "conversationState": "discovery",
                "turnNumber": 2,
                "elapsedTimeSeconds": 40
            }"#,
        )
        .expect("message output should decode");
        assert_eq!(output.sentiment, Sentiment::Neutral);
        assert!(output.hints.is_empty());
        assert!(output.audio_base64.is_none());
    }
}
