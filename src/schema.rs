diesel::table! {
    flights (key) {
        key -> Text,
        flight_type -> Text,
        flight_no -> Text,
        time_sched -> Text,
        time_est -> Text,
        origin_dest -> Text,
        gate -> Text,
        zone_current -> Text,
        zone_previous -> Text,
        zone_prev -> Text,
        gate_changed -> Bool,
        gate_chg_at -> Text,
        gate_chg_from_gate -> Text,
        gate_chg_to_gate -> Text,
        gate_chg_from_zone -> Text,
        gate_chg_to_zone -> Text,
        zone_changed -> Bool,
        zone_chg_at -> Text,
        zone_chg_from -> Text,
        zone_chg_to -> Text,
        time_changed -> Bool,
        time_chg_at -> Text,
        time_prev_est -> Text,
        time_delta_min -> Nullable<Integer>,
        alert_text -> Text,
        wchr -> Integer,
        wchc -> Integer,
        prev_wchr -> Integer,
        prev_wchc -> Integer,
        comment -> Text,
        assignment -> Text,
        pax_assisted -> Integer,
        watchlist -> Text,
        assign_edited_by -> Text,
        assign_edited_at -> Text,
        dispatch_ack -> Bool,
        piera_ack -> Bool,
        tb_ack -> Bool,
        t1_ack -> Bool,
        unassigned_ack -> Bool,
        gates_ack -> Bool,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    users (id) {
        id -> Integer,
        username -> Text,
        pin -> Text,
        role -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    zone_overrides (gate) {
        gate -> Text,
        zone -> Text,
    }
}

diesel::table! {
    us_airport_codes (code) {
        code -> Text,
    }
}

diesel::table! {
    archive (id) {
        id -> Integer,
        ops_date -> Text,
        archived_at -> Text,
        flight_data -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    flights,
    users,
    zone_overrides,
    us_airport_codes,
    archive,
);
