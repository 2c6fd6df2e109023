//! Fixed statements behind the case, group, user-profile and workflow lookups.
//!
//! Every caller-supplied value is interpolated as a quoted literal through
//! [`escape_literal`].

use chrono::NaiveDate;

/// Columns returned by case searches.
pub const CASE_COLUMNS: &[&str] = &[
    "r_object_id",
    "object_name",
    "subject",
    "ho_ro",
    "description",
    "department_name",
    "functions",
    "r_creation_date",
];

/// Columns returned by group searches.
pub const GROUP_COLUMNS: &[&str] = &[
    "r_object_id",
    "group_name",
    "description",
    "owner_name",
    "users_names",
    "groups_names",
    "r_creation_date",
    "r_modify_date",
];

/// Columns returned by user-profile searches.
pub const USER_PROFILE_COLUMNS: &[&str] = &[
    "r_object_id",
    "object_name",
    "uin",
    "department_name",
    "user_grade",
    "designation",
    "user_email_address",
    "user_login_name",
    "primary_mobile_number",
    "location",
    "office_type",
    "is_active",
    "hindi_user_name",
    "hindi_designation",
    "user_role",
];

/// Columns returned by the active-account listing.
pub const ACTIVE_USER_COLUMNS: &[&str] = &["user_name", "user_address", "user_privileges"];

/// Profile attributes a caller may change; anything else is dropped.
pub const EDITABLE_PROFILE_PROPERTIES: &[&str] = &[
    "object_name",
    "uin",
    "department_name",
    "user_grade",
    "designation",
    "user_email_address",
    "primary_mobile_number",
    "location",
    "office_type",
    "is_active",
    "hindi_user_name",
    "hindi_designation",
    "user_role",
];

/// Upper bound of the active-account listing.
pub const ACTIVE_USER_LIMIT: u32 = 1000;

/// Attributes a free-text user search is matched against.
const USER_SEARCH_ATTRIBUTES: &[&str] = &[
    "object_name",
    "uin",
    "user_login_name",
    "department_name",
    "designation",
];

/// Double single quotes so the value is safe inside `'...'`.
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// How a case search narrows `cms_case_folder`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseFilter {
    /// Cases created on or after the given day.
    CreatedSince(NaiveDate),
    /// Case number (object name) containing the term.
    NumberContains(String),
}

/// Case search, newest first, bounded to `return_top` rows.
pub fn case_search(filter: &CaseFilter, return_top: u32) -> String {
    let condition = match filter {
        CaseFilter::CreatedSince(day) => format!(
            "r_creation_date >= DATE('{}', 'yyyy-mm-dd')",
            day.format("%Y-%m-%d")
        ),
        CaseFilter::NumberContains(term) => {
            format!("object_name LIKE '%{}%'", escape_literal(term.trim()))
        }
    };

    format!(
        "SELECT {} FROM cms_case_folder WHERE {condition} ORDER BY r_creation_date DESC ENABLE(RETURN_TOP {return_top})",
        CASE_COLUMNS.join(", ")
    )
}

/// Groups whose name starts with `name_prefix` (all groups when `None`/blank).
pub fn group_search(name_prefix: Option<&str>) -> String {
    let mut dql = format!("SELECT {} FROM dm_group", GROUP_COLUMNS.join(", "));
    if let Some(prefix) = name_prefix.map(str::trim).filter(|p| !p.is_empty()) {
        dql.push_str(&format!(" WHERE group_name LIKE '{}%'", escape_literal(prefix)));
    }
    dql.push_str(" ORDER BY group_name");
    dql
}

/// User profiles with a non-blank name, optionally matching `term` anywhere
/// in the searchable attributes.
pub fn user_profile_search(term: Option<&str>) -> String {
    let mut dql = format!(
        "SELECT {} FROM cms_user_profile WHERE object_name IS NOT NULL AND object_name != ' '",
        USER_PROFILE_COLUMNS.join(", ")
    );

    if let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) {
        let term = escape_literal(term);
        let clauses: Vec<String> = USER_SEARCH_ATTRIBUTES
            .iter()
            .map(|attr| format!("{attr} LIKE '%{term}%'"))
            .collect();
        dql.push_str(&format!(" AND ({})", clauses.join(" OR ")));
    }

    dql.push_str(" ORDER BY object_name");
    dql
}

/// Workflows that carry the case as a package component.
pub fn workflow_ids_for_case(case_id: &str) -> String {
    format!(
        "SELECT DISTINCT r_workflow_id FROM dmi_package WHERE r_component_id = '{}'",
        escape_literal(case_id.trim())
    )
}

/// Active repository accounts (`user_state = 0`), by name.
pub fn active_users() -> String {
    format!(
        "SELECT {} FROM dm_user WHERE user_state = 0 ORDER BY user_name ENABLE(RETURN_TOP {ACTIVE_USER_LIMIT})",
        ACTIVE_USER_COLUMNS.join(", ")
    )
}

/// Login name behind a user profile.
pub fn profile_login_name(profile_id: &str) -> String {
    format!(
        "SELECT user_login_name FROM cms_user_profile WHERE r_object_id = '{}'",
        escape_literal(profile_id.trim())
    )
}

/// Enable or disable a repository account (`user_state` 0 or 1).
pub fn set_user_state(user_name: &str, active: bool) -> String {
    format!(
        "UPDATE dm_user OBJECTS SET user_state = {} WHERE user_name = '{}'",
        if active { 0 } else { 1 },
        escape_literal(user_name)
    )
}

/// Server method issuing a login ticket on behalf of `user_name`.
pub fn generate_login_ticket(user_name: &str) -> String {
    format!(
        "EXECUTE generateUserLoginTicket WITH user_name='{}'",
        escape_literal(user_name.trim())
    )
}

/// REST `filter` expression selecting workflows started from a process template.
pub fn process_filter(process_id: &str) -> String {
    format!("process_id='{}'", escape_literal(process_id.trim()))
}
