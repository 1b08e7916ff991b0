//! Link storage on top of redb
//!
//! All mutations go through this module, one write transaction per
//! operation, and every committed write bumps the snapshot version. Reads for
//! the dashboard go through [`owner_snapshot`], which hands the query engine an
//! owned copy of one owner's links.

use chrono::{DateTime, Utc};
use rand::{distr::Alphanumeric, Rng};
use redb::{Database, ReadableDatabase, ReadableTable, WriteTransaction};

use crate::database::{
    SNAPSHOT_VERSION_KEY, TABLE_CLICKS, TABLE_LINKS, TABLE_META, TABLE_OWNER_INDEX,
};
use crate::error::AppError;
use crate::model::{
    is_reserved_code, validate_metadata, validate_owner_id, validate_short_code, validate_url,
    ClickDetail, CreateLinkRequest, LinkRecord, UpdateLinkRequest,
};
use crate::query::LinkSnapshot;

const GENERATED_CODE_LEN: usize = 6;
const MAX_GENERATE_ATTEMPTS: usize = 5;

/// Oldest click details are dropped past this many per link
pub const MAX_CLICK_DETAILS: usize = 1000;

fn owner_key(owner_id: &str, short_code: &str) -> String {
    format!("{}:{}", owner_id, short_code)
}

fn generate_code() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_CODE_LEN)
        .map(char::from)
        .collect()
}

fn decode(key: &str, raw: &str) -> Result<LinkRecord, AppError> {
    serde_json::from_str(raw).map_err(|err| AppError::DataIntegrity {
        key: key.to_string(),
        reason: err.to_string(),
    })
}

fn decode_clicks(key: &str, raw: &str) -> Result<Vec<ClickDetail>, AppError> {
    serde_json::from_str(raw).map_err(|err| AppError::DataIntegrity {
        key: format!("clicks/{}", key),
        reason: err.to_string(),
    })
}

fn bump_version(txn: &WriteTransaction) -> Result<u64, AppError> {
    let mut meta = txn.open_table(TABLE_META)?;
    let next = meta
        .get(SNAPSHOT_VERSION_KEY)?
        .map(|guard| guard.value())
        .unwrap_or(0)
        + 1;
    meta.insert(SNAPSHOT_VERSION_KEY, next)?;
    Ok(next)
}

/// Reads and decodes `short_code` inside a write transaction
fn fetch_for_write(txn: &WriteTransaction, short_code: &str) -> Result<LinkRecord, AppError> {
    let links = txn.open_table(TABLE_LINKS)?;
    let raw = links
        .get(short_code)?
        .map(|guard| guard.value().to_string())
        .ok_or_else(|| AppError::NotFound(short_code.to_string()))?;
    decode(short_code, &raw)
}

fn write_record(txn: &WriteTransaction, record: &LinkRecord) -> Result<(), AppError> {
    let json = serde_json::to_string(record)?;
    let mut links = txn.open_table(TABLE_LINKS)?;
    links.insert(record.short_code.as_str(), json.as_str())?;
    Ok(())
}

fn check_owner(record: &LinkRecord, owner_id: &str) -> Result<(), AppError> {
    if record.owner_id == owner_id {
        Ok(())
    } else {
        tracing::warn!(
            short_code = %record.short_code,
            owner_id,
            "Rejected access to a link owned by someone else"
        );
        Err(AppError::Forbidden(record.short_code.clone()))
    }
}

/// Inserts `record`, refusing to overwrite an existing short code
fn insert_new(db: &Database, record: &LinkRecord) -> Result<(), AppError> {
    let json = serde_json::to_string(record)?;
    let code = record.short_code.as_str();

    let write_txn = db.begin_write()?;
    {
        let mut links = write_txn.open_table(TABLE_LINKS)?;
        if links.get(code)?.is_some() {
            return Err(AppError::Conflict(code.to_string()));
        }
        links.insert(code, json.as_str())?;

        let mut index = write_txn.open_table(TABLE_OWNER_INDEX)?;
        index.insert(owner_key(&record.owner_id, code).as_str(), code)?;
    }
    bump_version(&write_txn)?;
    write_txn.commit()?;

    Ok(())
}

/// Creates a link with the requested custom code, or a random one
///
/// A taken custom code is a conflict. Random codes are retried a few times
/// before giving up.
pub fn create_link(
    db: &Database,
    request: CreateLinkRequest,
    now: DateTime<Utc>,
) -> Result<LinkRecord, AppError> {
    let original_url = validate_url(&request.url)?;
    let owner_id = request.owner_id.trim().to_string();
    validate_owner_id(&owner_id)?;
    validate_metadata(
        request.title.as_deref(),
        request.description.as_deref(),
        Some(request.tags.as_slice()),
    )?;

    if request.expires_at.is_some_and(|at| at <= now) {
        return Err(AppError::Validation("expiresAt must be in the future".to_string()));
    }

    let custom_code = request
        .custom_code
        .map(|code| code.trim().to_string())
        .filter(|code| !code.is_empty());
    if let Some(code) = &custom_code {
        validate_short_code(code)?;
    }

    let mut record = LinkRecord {
        short_code: String::new(),
        original_url,
        owner_id,
        created_at: now,
        click_count: 0,
        title: request.title.filter(|t| !t.trim().is_empty()),
        description: request.description.filter(|d| !d.trim().is_empty()),
        tags: request.tags.into_iter().map(|t| t.trim().to_string()).collect(),
        expires_at: request.expires_at,
        is_active: true,
    };

    if let Some(code) = custom_code {
        record.short_code = code;
        insert_new(db, &record)?;
        tracing::info!(short_code = %record.short_code, owner_id = %record.owner_id, "Link created");
        return Ok(record);
    }

    for attempt in 1..=MAX_GENERATE_ATTEMPTS {
        record.short_code = generate_code();
        if is_reserved_code(&record.short_code) {
            continue;
        }
        match insert_new(db, &record) {
            Ok(()) => {
                tracing::info!(short_code = %record.short_code, owner_id = %record.owner_id, "Link created");
                return Ok(record);
            }
            Err(AppError::Conflict(code)) => {
                tracing::debug!(attempt, "Generated code {} already taken, retrying", code);
            }
            Err(err) => return Err(err),
        }
    }

    tracing::error!("Could not persist new link. Exhausted all retries of generating a unique code");
    Err(AppError::CodeExhausted)
}

/// Looks up a live (non-expired) link
pub fn get_link(db: &Database, short_code: &str, now: DateTime<Utc>) -> Result<LinkRecord, AppError> {
    let read_txn = db.begin_read()?;
    let links = read_txn.open_table(TABLE_LINKS)?;

    let record = match links.get(short_code)? {
        Some(guard) => decode(short_code, guard.value())?,
        None => return Err(AppError::NotFound(short_code.to_string())),
    };

    if record.is_expired(now) {
        return Err(AppError::NotFound(short_code.to_string()));
    }
    Ok(record)
}

/// Like [`get_link`], but only for the link's owner
pub fn get_owned_link(
    db: &Database,
    short_code: &str,
    owner_id: &str,
    now: DateTime<Utc>,
) -> Result<LinkRecord, AppError> {
    let record = get_link(db, short_code, now)?;
    check_owner(&record, owner_id)?;
    Ok(record)
}

/// Counts one redirect of a live, active link and returns the updated record
///
/// This is the only code path that changes `click_count`. The click is also
/// appended to the link's log in the same transaction; the log keeps the
/// newest [`MAX_CLICK_DETAILS`] entries.
pub fn record_click(db: &Database, short_code: &str, click: ClickDetail) -> Result<LinkRecord, AppError> {
    let write_txn = db.begin_write()?;

    let mut record = fetch_for_write(&write_txn, short_code)?;
    if record.is_expired(click.timestamp) || !record.is_active {
        return Err(AppError::NotFound(short_code.to_string()));
    }

    record.click_count = record
        .click_count
        .checked_add(1)
        .ok_or_else(|| AppError::DataIntegrity {
            key: short_code.to_string(),
            reason: "click counter is at its maximum".to_string(),
        })?;

    {
        let mut log = write_txn.open_table(TABLE_CLICKS)?;
        let mut clicks = match log.get(short_code)? {
            Some(guard) => decode_clicks(short_code, guard.value())?,
            None => Vec::new(),
        };
        clicks.push(click);
        if clicks.len() > MAX_CLICK_DETAILS {
            let excess = clicks.len() - MAX_CLICK_DETAILS;
            clicks.drain(..excess);
        }
        let json = serde_json::to_string(&clicks)?;
        log.insert(short_code, json.as_str())?;
    }

    write_record(&write_txn, &record)?;
    bump_version(&write_txn)?;
    write_txn.commit()?;

    tracing::debug!(short_code, clicks = record.click_count, "Click recorded");
    Ok(record)
}

/// Reads a link and its click log for the link's owner
///
/// Inactive links are readable here; only expired ones are gone.
pub fn owned_click_log(
    db: &Database,
    short_code: &str,
    owner_id: &str,
    now: DateTime<Utc>,
) -> Result<(LinkRecord, Vec<ClickDetail>), AppError> {
    let read_txn = db.begin_read()?;
    let links = read_txn.open_table(TABLE_LINKS)?;
    let log = read_txn.open_table(TABLE_CLICKS)?;

    let record = match links.get(short_code)? {
        Some(guard) => decode(short_code, guard.value())?,
        None => return Err(AppError::NotFound(short_code.to_string())),
    };
    if record.is_expired(now) {
        return Err(AppError::NotFound(short_code.to_string()));
    }
    check_owner(&record, owner_id)?;

    let clicks = match log.get(short_code)? {
        Some(guard) => decode_clicks(short_code, guard.value())?,
        None => Vec::new(),
    };
    Ok((record, clicks))
}

/// Edits the metadata and active flag of a link. Code, URL, owner, creation
/// time and clicks never change here.
pub fn update_link(
    db: &Database,
    short_code: &str,
    owner_id: &str,
    update: UpdateLinkRequest,
    now: DateTime<Utc>,
) -> Result<LinkRecord, AppError> {
    validate_metadata(
        update.title.as_deref(),
        update.description.as_ref().and_then(|d| d.as_deref()),
        update.tags.as_deref(),
    )?;
    if update.expires_at.flatten().is_some_and(|at| at <= now) {
        return Err(AppError::Validation("expiresAt must be in the future".to_string()));
    }

    let write_txn = db.begin_write()?;

    let mut record = fetch_for_write(&write_txn, short_code)?;
    if record.is_expired(now) {
        return Err(AppError::NotFound(short_code.to_string()));
    }
    check_owner(&record, owner_id)?;

    if let Some(title) = update.title {
        record.title = Some(title).filter(|t| !t.trim().is_empty());
    }
    if let Some(tags) = update.tags {
        record.tags = tags.into_iter().map(|t| t.trim().to_string()).collect();
    }
    if let Some(description) = update.description {
        record.description = description.filter(|d| !d.trim().is_empty());
    }
    // Some(None) clears the expiry
    if let Some(expires_at) = update.expires_at {
        record.expires_at = expires_at;
    }
    if let Some(is_active) = update.is_active {
        record.is_active = is_active;
    }

    write_record(&write_txn, &record)?;
    bump_version(&write_txn)?;
    write_txn.commit()?;

    tracing::info!(short_code, owner_id, "Link updated");
    Ok(record)
}

/// Deletes a link after verifying ownership and returns what was removed
pub fn delete_link(db: &Database, short_code: &str, owner_id: &str) -> Result<LinkRecord, AppError> {
    let write_txn = db.begin_write()?;

    let record = fetch_for_write(&write_txn, short_code)?;
    check_owner(&record, owner_id)?;

    {
        let mut links = write_txn.open_table(TABLE_LINKS)?;
        links.remove(short_code)?;

        let mut index = write_txn.open_table(TABLE_OWNER_INDEX)?;
        index.remove(owner_key(&record.owner_id, short_code).as_str())?;

        let mut log = write_txn.open_table(TABLE_CLICKS)?;
        log.remove(short_code)?;
    }
    bump_version(&write_txn)?;
    write_txn.commit()?;

    tracing::info!(short_code, owner_id, "Link deleted");
    Ok(record)
}

/// Reads every live link of `owner_id` together with the current version stamp
///
/// A record that fails to decode, or an index entry pointing at nothing, is
/// reported as [`AppError::DataIntegrity`] instead of being skipped.
pub fn owner_snapshot(db: &Database, owner_id: &str, now: DateTime<Utc>) -> Result<LinkSnapshot, AppError> {
    let read_txn = db.begin_read()?;
    let meta = read_txn.open_table(TABLE_META)?;
    let index = read_txn.open_table(TABLE_OWNER_INDEX)?;
    let links = read_txn.open_table(TABLE_LINKS)?;

    let version = meta
        .get(SNAPSHOT_VERSION_KEY)?
        .map(|guard| guard.value())
        .unwrap_or(0);

    // ';' is the character right after ':', so this covers exactly one owner
    let start_key = format!("{}:", owner_id);
    let end_key = format!("{};", owner_id);

    let mut records = Vec::new();
    for entry in index.range(start_key.as_str()..end_key.as_str())? {
        let (_, code_guard) = entry?;
        let code = code_guard.value();

        let record = match links.get(code)? {
            Some(guard) => decode(code, guard.value())?,
            None => {
                return Err(AppError::DataIntegrity {
                    key: code.to_string(),
                    reason: format!("indexed for owner `{}` but missing from links", owner_id),
                })
            }
        };

        if !record.is_expired(now) {
            records.push(record);
        }
    }

    Ok(LinkSnapshot {
        version,
        taken_at: now,
        records,
    })
}

/// Removes every link whose expiry has elapsed and returns how many were removed
pub fn purge_expired(db: &Database, now: DateTime<Utc>) -> Result<usize, AppError> {
    let write_txn = db.begin_write()?;

    let expired: Vec<(String, String)> = {
        let links = write_txn.open_table(TABLE_LINKS)?;
        let mut expired = Vec::new();
        for entry in links.iter()? {
            let (key, value) = entry?;
            match decode(key.value(), value.value()) {
                Ok(record) if record.is_expired(now) => {
                    expired.push((record.short_code, record.owner_id));
                }
                Ok(_) => {}
                Err(err) => tracing::warn!("Skipping unreadable record during expiry sweep: {}", err),
            }
        }
        expired
    };

    if expired.is_empty() {
        write_txn.abort()?;
        return Ok(0);
    }

    {
        let mut links = write_txn.open_table(TABLE_LINKS)?;
        let mut index = write_txn.open_table(TABLE_OWNER_INDEX)?;
        let mut log = write_txn.open_table(TABLE_CLICKS)?;
        for (code, owner_id) in &expired {
            links.remove(code.as_str())?;
            index.remove(owner_key(owner_id, code).as_str())?;
            log.remove(code.as_str())?;
        }
    }
    bump_version(&write_txn)?;
    write_txn.commit()?;

    tracing::info!("Purged {} expired links", expired.len());
    Ok(expired.len())
}
