use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// A live flight row. The key is `YYYY-MM-DD|TYPE|FLIGHT|HH:mm` in the
/// airport's local zone and never changes once inserted.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::flights)]
pub struct Flight {
    pub key: String,
    pub flight_type: String,
    pub flight_no: String,
    pub time_sched: String,
    pub time_est: String,
    pub origin_dest: String,
    pub gate: String,
    pub zone_current: String,
    pub zone_previous: String,
    pub zone_prev: String,
    pub gate_changed: bool,
    pub gate_chg_at: String,
    pub gate_chg_from_gate: String,
    pub gate_chg_to_gate: String,
    pub gate_chg_from_zone: String,
    pub gate_chg_to_zone: String,
    pub zone_changed: bool,
    pub zone_chg_at: String,
    pub zone_chg_from: String,
    pub zone_chg_to: String,
    pub time_changed: bool,
    pub time_chg_at: String,
    pub time_prev_est: String,
    pub time_delta_min: Option<i32>,
    pub alert_text: String,
    pub wchr: i32,
    pub wchc: i32,
    pub prev_wchr: i32,
    pub prev_wchc: i32,
    pub comment: String,
    pub assignment: String,
    pub pax_assisted: i32,
    pub watchlist: String,
    pub assign_edited_by: String,
    pub assign_edited_at: String,
    pub dispatch_ack: bool,
    pub piera_ack: bool,
    pub tb_ack: bool,
    pub t1_ack: bool,
    pub unassigned_ack: bool,
    pub gates_ack: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Flight {
    /// The ACK flag of the board owning the given zone label, or `None` when
    /// the label has no board of its own (free-form override zones).
    pub fn board_ack(&self, zone: &str) -> Option<bool> {
        match zone {
            "Pier A" => Some(self.piera_ack),
            "TB" => Some(self.tb_ack),
            "Gates" => Some(self.gates_ack),
            "T1" => Some(self.t1_ack),
            "Unassigned" => Some(self.unassigned_ack),
            _ => None,
        }
    }
}

/// Everything the sync engine is allowed to write on an existing row. Manual
/// fields and `zone_previous` are absent on purpose.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = crate::schema::flights)]
pub struct SyncChangeset {
    pub flight_no: String,
    pub time_sched: String,
    pub time_est: String,
    pub origin_dest: String,
    pub gate: String,
    pub zone_current: String,
    pub zone_prev: String,
    pub gate_changed: bool,
    pub gate_chg_at: String,
    pub gate_chg_from_gate: String,
    pub gate_chg_to_gate: String,
    pub gate_chg_from_zone: String,
    pub gate_chg_to_zone: String,
    pub zone_changed: bool,
    pub zone_chg_at: String,
    pub zone_chg_from: String,
    pub zone_chg_to: String,
    pub time_changed: bool,
    pub time_chg_at: String,
    pub time_prev_est: String,
    pub time_delta_min: Option<i32>,
    pub alert_text: String,
    pub dispatch_ack: bool,
    pub piera_ack: bool,
    pub tb_ack: bool,
    pub t1_ack: bool,
    pub unassigned_ack: bool,
    pub gates_ack: bool,
    pub updated_at: String,
}

/// Partial update from the Dispatch board. `None` fields are left untouched.
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = crate::schema::flights)]
pub struct DispatchUpdate {
    pub wchr: Option<i32>,
    pub wchc: Option<i32>,
    pub prev_wchr: Option<i32>,
    pub prev_wchc: Option<i32>,
    pub comment: Option<String>,
    pub updated_at: Option<String>,
}

/// Partial update from a zone Lead.
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = crate::schema::flights)]
pub struct LeadUpdate {
    pub assignment: Option<String>,
    pub pax_assisted: Option<i32>,
    pub watchlist: Option<String>,
    pub assign_edited_by: Option<String>,
    pub assign_edited_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::users)]
pub struct User {
    pub id: i32,
    pub username: String,
    #[serde(skip_serializing)]
    pub pin: String,
    pub role: String,
    pub created_at: String,
}

#[derive(Debug, Insertable, Deserialize)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub username: String,
    pub pin: String,
    pub role: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::zone_overrides)]
pub struct ZoneOverride {
    pub gate: String,
    pub zone: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::archive)]
pub struct ArchiveRow {
    pub id: i32,
    pub ops_date: String,
    pub archived_at: String,
    pub flight_data: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::archive)]
pub struct NewArchiveRow {
    pub ops_date: String,
    pub archived_at: String,
    pub flight_data: String,
}

/// Compact camelCase projection served to clients, sorted by `timeEst`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightView {
    pub key: String,
    #[serde(rename = "type")]
    pub flight_type: String,
    pub flight: String,
    pub time_sched: String,
    pub time_est: String,
    pub origin_dest: String,
    pub gate: String,
    pub zone_current: String,
    pub zone_prev: String,
    pub alert_text: String,
    pub gate_changed: bool,
    pub gate_chg_from_gate: String,
    pub gate_chg_to_gate: String,
    pub gate_chg_from_zone: String,
    pub gate_chg_to_zone: String,
    pub zone_changed: bool,
    pub zone_chg_from: String,
    pub zone_chg_to: String,
    pub time_changed: bool,
    pub time_prev_est: String,
    pub time_delta_min: Option<i32>,
    pub wchr: i32,
    pub wchc: i32,
    pub prev_wchr: i32,
    pub prev_wchc: i32,
    pub comment: String,
    pub assignment: String,
    pub pax_assisted: i32,
    pub watchlist: String,
    pub assign_edited_by: String,
    pub assign_edited_at: String,
    pub dispatch_ack: bool,
    pub piera_ack: bool,
    pub tb_ack: bool,
    pub t1_ack: bool,
    pub unassigned_ack: bool,
    pub gates_ack: bool,
    pub updated_at: String,
}

impl From<&Flight> for FlightView {
    fn from(f: &Flight) -> Self {
        FlightView {
            key: f.key.clone(),
            flight_type: f.flight_type.clone(),
            flight: f.flight_no.clone(),
            time_sched: f.time_sched.clone(),
            time_est: f.time_est.clone(),
            origin_dest: f.origin_dest.clone(),
            gate: f.gate.clone(),
            zone_current: f.zone_current.clone(),
            zone_prev: f.zone_prev.clone(),
            alert_text: f.alert_text.clone(),
            gate_changed: f.gate_changed,
            gate_chg_from_gate: f.gate_chg_from_gate.clone(),
            gate_chg_to_gate: f.gate_chg_to_gate.clone(),
            gate_chg_from_zone: f.gate_chg_from_zone.clone(),
            gate_chg_to_zone: f.gate_chg_to_zone.clone(),
            zone_changed: f.zone_changed,
            zone_chg_from: f.zone_chg_from.clone(),
            zone_chg_to: f.zone_chg_to.clone(),
            time_changed: f.time_changed,
            time_prev_est: f.time_prev_est.clone(),
            time_delta_min: f.time_delta_min,
            wchr: f.wchr,
            wchc: f.wchc,
            prev_wchr: f.prev_wchr,
            prev_wchc: f.prev_wchc,
            comment: f.comment.clone(),
            assignment: f.assignment.clone(),
            pax_assisted: f.pax_assisted,
            watchlist: f.watchlist.clone(),
            assign_edited_by: f.assign_edited_by.clone(),
            assign_edited_at: f.assign_edited_at.clone(),
            dispatch_ack: f.dispatch_ack,
            piera_ack: f.piera_ack,
            tb_ack: f.tb_ack,
            t1_ack: f.t1_ack,
            unassigned_ack: f.unassigned_ack,
            gates_ack: f.gates_ack,
            updated_at: f.updated_at.clone(),
        }
    }
}

impl FlightView {
    /// Once Dispatch has acknowledged, the dispatcher view hides the alert
    /// and the change markers that produced it.
    pub fn blank_acknowledged_alert(&mut self) {
        if self.dispatch_ack {
            self.alert_text.clear();
            self.gate_changed = false;
            self.zone_changed = false;
            self.time_changed = false;
            self.time_delta_min = None;
            self.time_prev_est.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_flight() -> Flight {
        Flight {
            key: "2025-02-25|ARR|WS 816|06:30".into(),
            flight_type: "ARR".into(),
            flight_no: "WS 816".into(),
            time_sched: "2025-02-25T11:30:00Z".into(),
            time_est: "2025-02-25T11:30:00Z".into(),
            origin_dest: "YEG".into(),
            gate: "B3".into(),
            zone_current: "Pier A".into(),
            zone_previous: "Pier A".into(),
            zone_prev: String::new(),
            gate_changed: false,
            gate_chg_at: String::new(),
            gate_chg_from_gate: String::new(),
            gate_chg_to_gate: String::new(),
            gate_chg_from_zone: String::new(),
            gate_chg_to_zone: String::new(),
            zone_changed: false,
            zone_chg_at: String::new(),
            zone_chg_from: String::new(),
            zone_chg_to: String::new(),
            time_changed: true,
            time_chg_at: "2025-02-25T10:00:00Z".into(),
            time_prev_est: "2025-02-25T11:00:00Z".into(),
            time_delta_min: Some(30),
            alert_text: "TimeDelta: 30 min".into(),
            wchr: 2,
            wchc: 1,
            prev_wchr: 0,
            prev_wchc: 0,
            comment: String::new(),
            assignment: String::new(),
            pax_assisted: 0,
            watchlist: String::new(),
            assign_edited_by: String::new(),
            assign_edited_at: String::new(),
            dispatch_ack: true,
            piera_ack: false,
            tb_ack: false,
            t1_ack: false,
            unassigned_ack: false,
            gates_ack: false,
            created_at: "2025-02-25T09:00:00Z".into(),
            updated_at: "2025-02-25T10:00:00Z".into(),
        }
    }

    #[test]
    fn view_uses_camel_case_and_type_alias() {
        let view = FlightView::from(&sample_flight());
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["type"], "ARR");
        assert_eq!(value["flight"], "WS 816");
        assert_eq!(value["timeEst"], "2025-02-25T11:30:00Z");
        assert_eq!(value["zoneCurrent"], "Pier A");
        assert!(value.get("flightNo").is_none());
    }

    #[test]
    fn dispatch_ack_blanks_alert_fields_in_view_only() {
        let flight = sample_flight();
        let mut view = FlightView::from(&flight);
        view.blank_acknowledged_alert();
        assert_eq!(view.alert_text, "");
        assert!(!view.time_changed);
        assert_eq!(view.time_delta_min, None);
        // Manual counters survive the blanking.
        assert_eq!(view.wchr, 2);
        // Source row is untouched.
        assert_eq!(flight.alert_text, "TimeDelta: 30 min");
    }

    #[test]
    fn board_ack_maps_zone_labels() {
        let mut flight = sample_flight();
        flight.tb_ack = true;
        assert_eq!(flight.board_ack("TB"), Some(true));
        assert_eq!(flight.board_ack("Pier A"), Some(false));
        // Free-form override zones have no board of their own.
        assert_eq!(flight.board_ack("Valet"), None);
    }

    #[test]
    fn archive_snapshot_round_trips_through_json() {
        let flight = sample_flight();
        let json = serde_json::to_string(&flight).unwrap();
        let back: Flight = serde_json::from_str(&json).unwrap();
        assert_eq!(back, flight);
    }
}
