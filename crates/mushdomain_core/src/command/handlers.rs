//! Built-in command handlers.
//!
//! Each handler reads its parameters by positional slot or register name,
//! calls one store, and shapes the reply. Parameter order follows the host's
//! softcode calls, e.g. `claimDomain <owner> <sphere> <name> <room>`.

use super::error::{CommandError, CommandResult};
use super::params::Params;
use super::registry::FnHandler;
use super::reply::{
    format_bundle, format_feeding, format_history, format_listing, format_security, Reply,
};
use crate::model::boon::{BoonId, NewBoon};
use crate::repo::boon_repo::{BoonLedger, SqliteBoonLedger};
use crate::repo::domain_repo::{DomainStore, SqliteDomainStore};
use crate::repo::feeding_repo::{FeedingStore, SqliteFeedingStore};
use rusqlite::Connection;

/// Every built-in command, in registration order.
pub fn default_handlers() -> Vec<FnHandler> {
    vec![
        FnHandler::direct("test", self_test),
        FnHandler::transactional("claimDomain", claim_domain),
        FnHandler::transactional("addRoomToDomain", add_room_to_domain),
        FnHandler::direct("removeRoomFromDomain", remove_room_from_domain),
        FnHandler::transactional("addPlayersToDomain", add_players_to_domain),
        FnHandler::transactional("removePlayersFromDomain", remove_players_from_domain),
        FnHandler::transactional("setDomainDetails", set_domain_details),
        FnHandler::transactional("revokeDomain", revoke_domain),
        FnHandler::transactional("transferDomain", transfer_domain),
        FnHandler::direct("leaveDomain", leave_domain),
        FnHandler::direct("checkMembership", check_membership),
        FnHandler::direct("getDomainDetails", get_domain_details),
        FnHandler::direct("adminGetDomainDetails", admin_get_domain_details),
        FnHandler::direct("getDomainSecurity", get_domain_security),
        FnHandler::direct("setFeedingMethod", set_feeding_method),
        FnHandler::direct("setFeedingPool", set_feeding_pool),
        FnHandler::direct("getFeeding", get_feeding),
        FnHandler::direct("addNewBoonToDB", add_new_boon),
        FnHandler::direct("validateBoon", validate_boon),
        FnHandler::transactional("rejectBoon", reject_boon),
        FnHandler::direct("acknowledgeBoon", acknowledge_boon),
        FnHandler::transactional("transferBoon", transfer_boon),
        FnHandler::direct("showBoons", show_boons),
        FnHandler::direct("boonHistory", boon_history),
    ]
}

fn self_test(_: &Connection, _: &Params) -> CommandResult<Reply> {
    Ok(Reply::text("success"))
}

fn claim_domain(conn: &Connection, params: &Params) -> CommandResult<Reply> {
    let domain_id = SqliteDomainStore::new(conn).claim_domain(
        params.required(0, "owner")?,
        params.required(1, "sphere")?,
        params.required(2, "name")?,
        params.required(3, "room")?,
    )?;
    Ok(Reply::Number(domain_id))
}

fn add_room_to_domain(conn: &Connection, params: &Params) -> CommandResult<Reply> {
    SqliteDomainStore::new(conn).add_room_to_domain(
        params.required(0, "owner")?,
        params.required(1, "sphere")?,
        params.required(2, "name")?,
        params.required(3, "room")?,
    )?;
    Ok(Reply::ok())
}

fn remove_room_from_domain(conn: &Connection, params: &Params) -> CommandResult<Reply> {
    let removed = SqliteDomainStore::new(conn).remove_room_from_domain(
        params.required(0, "owner")?,
        params.required(1, "sphere")?,
        params.required(2, "name")?,
        params.required(3, "room")?,
    )?;
    Ok(Reply::from(removed))
}

fn add_players_to_domain(conn: &Connection, params: &Params) -> CommandResult<Reply> {
    let members = required_list(params, 2, "members")?;
    let added = SqliteDomainStore::new(conn).add_members(
        params.required(0, "owner")?,
        params.required(1, "name")?,
        &members,
    )?;
    Ok(Reply::from(added))
}

fn remove_players_from_domain(conn: &Connection, params: &Params) -> CommandResult<Reply> {
    let members = required_list(params, 2, "members")?;
    let removed = SqliteDomainStore::new(conn).remove_members(
        params.required(0, "owner")?,
        params.required(1, "name")?,
        &members,
    )?;
    Ok(Reply::from(removed))
}

/// A `key` register selects the single-pair form so values may hold spaces.
fn set_domain_details(conn: &Connection, params: &Params) -> CommandResult<Reply> {
    let tokens = match params.register("key") {
        Some(key) => vec![
            key.to_string(),
            params
                .register("value")
                .ok_or(CommandError::MissingParameter("value"))?
                .to_string(),
        ],
        None => required_list(params, 2, "details")?,
    };
    let written = SqliteDomainStore::new(conn).set_details(
        params.required(0, "owner")?,
        params.required(1, "name")?,
        &tokens,
    )?;
    Ok(Reply::from(written))
}

fn revoke_domain(conn: &Connection, params: &Params) -> CommandResult<Reply> {
    SqliteDomainStore::new(conn)
        .revoke_domain(params.required(0, "owner")?, params.required(1, "name")?)?;
    Ok(Reply::ok())
}

fn transfer_domain(conn: &Connection, params: &Params) -> CommandResult<Reply> {
    SqliteDomainStore::new(conn).transfer_domain(
        params.required(0, "oldowner")?,
        params.required(1, "newowner")?,
        params.required(2, "name")?,
    )?;
    Ok(Reply::ok())
}

fn leave_domain(conn: &Connection, params: &Params) -> CommandResult<Reply> {
    SqliteDomainStore::new(conn)
        .leave_domain(params.required(0, "member")?, params.required(1, "name")?)?;
    Ok(Reply::ok())
}

fn check_membership(conn: &Connection, params: &Params) -> CommandResult<Reply> {
    let is_member = SqliteDomainStore::new(conn).check_membership(
        params.required(0, "member")?,
        params.required(1, "sphere")?,
        params.required(2, "room")?,
    )?;
    Ok(Reply::Flag(is_member))
}

fn get_domain_details(conn: &Connection, params: &Params) -> CommandResult<Reply> {
    let bundle = SqliteDomainStore::new(conn)
        .fetch_domain_details(params.required(0, "requester")?, params.required(1, "name")?)?;
    Ok(Reply::Text(format_bundle(&bundle)))
}

fn admin_get_domain_details(conn: &Connection, params: &Params) -> CommandResult<Reply> {
    let bundle =
        SqliteDomainStore::new(conn).admin_fetch_domain_details(params.required(0, "name")?)?;
    Ok(Reply::Text(format_bundle(&bundle)))
}

fn get_domain_security(conn: &Connection, params: &Params) -> CommandResult<Reply> {
    let security = SqliteDomainStore::new(conn)
        .get_domain_security(params.required(0, "room")?, params.required(1, "sphere")?)?;
    Ok(Reply::Text(format_security(&security)))
}

fn set_feeding_method(conn: &Connection, params: &Params) -> CommandResult<Reply> {
    SqliteFeedingStore::new(conn)
        .set_feeding_method(params.required(0, "player")?, params.required(1, "method")?)?;
    Ok(Reply::ok())
}

fn set_feeding_pool(conn: &Connection, params: &Params) -> CommandResult<Reply> {
    SqliteFeedingStore::new(conn)
        .set_feeding_pool(params.required(0, "player")?, params.required(1, "pool")?)?;
    Ok(Reply::ok())
}

fn get_feeding(conn: &Connection, params: &Params) -> CommandResult<Reply> {
    let preference = SqliteFeedingStore::new(conn).get_feeding(params.required(0, "player")?)?;
    Ok(Reply::Text(format_feeding(preference.as_ref())))
}

fn add_new_boon(conn: &Connection, params: &Params) -> CommandResult<Reply> {
    let boon = NewBoon {
        from: params.required(0, "from")?.to_string(),
        to: params.required(1, "to")?.to_string(),
        magnitude: params.parse::<f64>(2, "magnitude")?,
        validated: params.flag(3, "validated", false)?,
        acknowledged: params.flag(4, "acknowledged", false)?,
        private: params.flag(5, "private", false)?,
        created_at: None,
    };
    let boon_id = SqliteBoonLedger::new(conn).add_boon(&boon)?;
    Ok(Reply::Number(boon_id))
}

fn validate_boon(conn: &Connection, params: &Params) -> CommandResult<Reply> {
    let validated = SqliteBoonLedger::new(conn)
        .validate_boon(params.parse::<BoonId>(0, "id")?, params.required(1, "from")?)?;
    Ok(Reply::Flag(validated))
}

fn reject_boon(conn: &Connection, params: &Params) -> CommandResult<Reply> {
    SqliteBoonLedger::new(conn)
        .reject_boon(params.parse::<BoonId>(0, "id")?, params.required(1, "from")?)?;
    Ok(Reply::ok())
}

fn acknowledge_boon(conn: &Connection, params: &Params) -> CommandResult<Reply> {
    let acknowledged =
        SqliteBoonLedger::new(conn).acknowledge_boon(params.parse::<BoonId>(0, "id")?)?;
    Ok(Reply::Flag(acknowledged))
}

fn transfer_boon(conn: &Connection, params: &Params) -> CommandResult<Reply> {
    SqliteBoonLedger::new(conn).transfer_boon(
        params.parse::<BoonId>(0, "id")?,
        params.required(1, "fromholder")?,
        params.required(2, "toholder")?,
    )?;
    Ok(Reply::ok())
}

fn show_boons(conn: &Connection, params: &Params) -> CommandResult<Reply> {
    let listing = SqliteBoonLedger::new(conn).show_boons(params.required(0, "actor")?)?;
    Ok(Reply::Text(format_listing(&listing)))
}

fn boon_history(conn: &Connection, params: &Params) -> CommandResult<Reply> {
    let history =
        SqliteBoonLedger::new(conn).boon_transfer_history(params.parse::<BoonId>(0, "id")?)?;
    Ok(Reply::Text(format_history(&history)))
}

fn required_list(
    params: &Params,
    start: usize,
    name: &'static str,
) -> CommandResult<Vec<String>> {
    let values = params.list(start, name);
    if values.is_empty() {
        return Err(CommandError::MissingParameter(name));
    }
    Ok(values)
}
