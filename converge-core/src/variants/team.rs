//! Team - a named membership list.
//!
//! The `Teams` collection accepts incremental updates: membership changes are
//! sent as `addMembers` / `removeMembers` deltas instead of the full list.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::diff::{ChangeSummary, diff_lists};
use crate::registry::{CodecError, VariantCodec};
use crate::remote::{RequestKind, WireRequest, WireResponse};
use crate::state::{Payload, Variant};

const COLLECTION: &str = "Teams";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Member user IDs. Treated as a set.
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct Wire {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    members: Vec<String>,
}

#[derive(Deserialize)]
struct Envelope {
    data: Wire,
}

pub struct TeamCodec;

impl TeamCodec {
    fn team(payload: &Payload) -> Result<&Team, CodecError> {
        match payload {
            Payload::Team(team) => Ok(team),
            other => Err(CodecError::wrong_shape("team", other)),
        }
    }
}

impl VariantCodec for TeamCodec {
    fn variant(&self) -> Variant {
        Variant::TEAM
    }

    fn collection(&self) -> &str {
        COLLECTION
    }

    fn update_mode(&self) -> RequestKind {
        RequestKind::Incremental
    }

    fn encode(&self, desired: &Payload) -> Result<WireRequest, CodecError> {
        let team = Self::team(desired)?;
        let wire = Wire {
            name: team.name.clone(),
            description: team.description.clone(),
            members: team.members.clone(),
        };
        Ok(WireRequest::full(serde_json::to_value(wire)?))
    }

    fn changes(&self, desired: &Payload, observed: &Payload) -> ChangeSummary {
        let mut summary = ChangeSummary::default();
        if let (Payload::Team(want), Payload::Team(have)) = (desired, observed) {
            summary.scalar("name", &want.name, &have.name);
            summary.scalar("description", &want.description, &have.description);
            summary.list("members", &want.members, &have.members);
        }
        summary
    }

    fn encode_update(
        &self,
        desired: &Payload,
        observed: &Payload,
    ) -> Result<(WireRequest, ChangeSummary), CodecError> {
        let want = Self::team(desired)?;
        let have = Self::team(observed)?;
        let members = diff_lists(&want.members, &have.members);

        let mut body = Map::new();
        body.insert("name".to_string(), Value::from(want.name.clone()));
        body.insert(
            "description".to_string(),
            Value::from(want.description.clone()),
        );
        if !members.to_add.is_empty() {
            body.insert("addMembers".to_string(), Value::from(members.to_add));
        }
        if !members.to_remove.is_empty() {
            body.insert("removeMembers".to_string(), Value::from(members.to_remove));
        }

        Ok((
            WireRequest::incremental(Value::Object(body)),
            self.changes(desired, observed),
        ))
    }

    fn decode(&self, response: &WireResponse) -> Result<Payload, CodecError> {
        let Envelope { data } = serde_json::from_value(response.body.clone())?;
        Ok(Payload::Team(Team {
            name: data.name,
            description: data.description,
            members: data.members,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn team(members: &[&str]) -> Payload {
        Payload::Team(Team {
            name: "platform".to_string(),
            description: String::new(),
            members: members.iter().map(|m| m.to_string()).collect(),
        })
    }

    #[test]
    fn test_update_sends_only_membership_delta() {
        let (request, changes) = TeamCodec
            .encode_update(&team(&["a", "b", "c"]), &team(&["b", "c", "d"]))
            .unwrap();

        assert_eq!(request.kind, RequestKind::Incremental);
        assert_eq!(
            request.body,
            json!({
                "name": "platform",
                "description": "",
                "addMembers": ["a"],
                "removeMembers": ["d"]
            })
        );
        assert_eq!(changes.to_string(), "members: +[a] -[d]");
    }

    #[test]
    fn test_update_without_membership_change() {
        let (request, changes) = TeamCodec
            .encode_update(&team(&["b", "a"]), &team(&["a", "b"]))
            .unwrap();
        assert!(request.body.get("addMembers").is_none());
        assert!(request.body.get("removeMembers").is_none());
        assert!(changes.is_empty());
    }
}
