//! FHIR-like projection of the core record.
//!
//! Pure read-time transform: renders a core record as an Encounter-shaped
//! interchange document. Nothing here is persisted and nothing feeds back
//! into storage.

use serde_json::{json, Value as JsonValue};

use crate::status::VisitStatus;
use crate::visit::CoreRecord;

/// Encounter status vocabulary used by the interchange format.
fn encounter_status(status: VisitStatus) -> &'static str {
    match status {
        VisitStatus::Planned => "planned",
        VisitStatus::InProgress => "in-progress",
        VisitStatus::Completed => "finished",
        VisitStatus::Cancelled => "cancelled",
    }
}

/// Render a core record as an Encounter resource.
pub fn to_encounter(core: &CoreRecord) -> JsonValue {
    let mut resource = json!({
        "resourceType": "Encounter",
        "id": core.id.to_string(),
        "status": encounter_status(core.status),
        "class": {
            "system": "http://terminology.hl7.org/CodeSystem/v3-ActCode",
            "code": "HH",
            "display": "home health"
        },
        "subject": {
            "reference": format!("Patient/{}", core.patient_id),
        },
        "participant": [{
            "individual": {
                "reference": format!("Practitioner/{}", core.nurse_id),
            }
        }],
        "text": {
            "status": "generated",
            "div": narrative(core),
        },
    });

    if let Some(name) = &core.patient_name {
        resource["subject"]["display"] = json!(name);
    }
    if let Some(name) = &core.nurse_name {
        resource["participant"][0]["individual"]["display"] = json!(name);
    }

    let mut period = serde_json::Map::new();
    let start = core.start_time.unwrap_or(core.scheduled_time);
    period.insert("start".into(), json!(start.to_rfc3339()));
    if let Some(end) = core.end_time {
        period.insert("end".into(), json!(end.to_rfc3339()));
    }
    resource["period"] = JsonValue::Object(period);

    if let Some(location) = &core.location {
        resource["location"] = json!([{
            "location": { "display": location }
        }]);
    }

    resource
}

fn narrative(core: &CoreRecord) -> String {
    let patient = core.patient_name.as_deref().unwrap_or(&core.patient_id);
    let nurse = core.nurse_name.as_deref().unwrap_or(&core.nurse_id);
    format!(
        "<div xmlns=\"http://www.w3.org/1999/xhtml\">Visit for {} by {} ({})</div>",
        patient,
        nurse,
        encounter_status(core.status)
    )
}
