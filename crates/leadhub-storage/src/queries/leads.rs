// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead upsert, lookup, and conditional assignment.

use leadhub_core::{Claim, Lead, LeadProfile, LeadhubError, Pipeline, normalize_phone, now_timestamp};
use rusqlite::{Connection, OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::models::{LEAD_COLUMNS, lead_from_row};

pub(crate) fn select_lead(conn: &Connection, id: &str) -> rusqlite::Result<Option<Lead>> {
    conn.query_row(
        &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1"),
        params![id],
        lead_from_row,
    )
    .optional()
}

pub(crate) fn select_lead_by_phone(
    conn: &Connection,
    phone: &str,
) -> rusqlite::Result<Option<Lead>> {
    conn.query_row(
        &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE phone = ?1"),
        params![phone],
        lead_from_row,
    )
    .optional()
}

/// Whether `name` is a real display name rather than the phone fallback.
pub(crate) fn is_richer_name(name: &str, phone: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && normalize_phone(name) != phone
}

/// Find by phone or insert. Runs on the caller's connection or transaction.
pub(crate) fn find_or_insert_lead(
    conn: &Connection,
    profile: &LeadProfile,
) -> rusqlite::Result<(Lead, bool)> {
    let phone = normalize_phone(&profile.phone);

    if let Some(existing) = select_lead_by_phone(conn, &phone)? {
        let better_name = profile
            .name
            .as_deref()
            .filter(|n| is_richer_name(n, &phone) && existing.name == existing.phone);
        let fill_email = existing.email.is_none() && profile.email.is_some();
        let fill_company = existing.company.is_none() && profile.company.is_some();
        if better_name.is_none() && !fill_email && !fill_company {
            return Ok((existing, false));
        }

        conn.execute(
            "UPDATE leads SET name = COALESCE(?2, name),
                 email = COALESCE(email, ?3),
                 company = COALESCE(company, ?4),
                 updated_at = ?5
             WHERE id = ?1",
            params![
                existing.id,
                better_name.map(str::trim),
                profile.email,
                profile.company,
                now_timestamp()
            ],
        )?;
        let refreshed = select_lead(conn, &existing.id)?.unwrap_or(existing);
        return Ok((refreshed, false));
    }

    let now = now_timestamp();
    let lead = Lead {
        id: uuid::Uuid::new_v4().to_string(),
        name: profile
            .name
            .as_deref()
            .filter(|n| is_richer_name(n, &phone))
            .map(|n| n.trim().to_string())
            .unwrap_or_else(|| phone.clone()),
        phone,
        email: profile.email.clone(),
        company: profile.company.clone(),
        pipeline: profile.pipeline,
        status: Pipeline::INITIAL_STAGE.to_string(),
        source: profile.source.clone(),
        estimated_value: None,
        tags: Default::default(),
        assigned_to: None,
        assigned_at: None,
        created_at: now.clone(),
        updated_at: now,
    };
    conn.execute(
        &format!(
            "INSERT INTO leads ({LEAD_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, '[]', NULL, NULL, ?10, ?11)"
        ),
        params![
            lead.id,
            lead.name,
            lead.phone,
            lead.email,
            lead.company,
            lead.pipeline.to_string(),
            lead.status,
            lead.source,
            lead.estimated_value,
            lead.created_at,
            lead.updated_at,
        ],
    )?;
    Ok((lead, true))
}

/// Find a lead by phone or create it in the initial stage.
pub async fn upsert_lead(db: &Database, profile: LeadProfile) -> Result<(Lead, bool), LeadhubError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let result = find_or_insert_lead(&tx, &profile)?;
            tx.commit()?;
            Ok(result)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_lead(db: &Database, id: &str) -> Result<Option<Lead>, LeadhubError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| select_lead(conn, &id))
        .await
        .map_err(map_tr_err)
}

/// Unassigned leads in one of `statuses`, oldest first.
pub async fn list_leads_for_assignment(
    db: &Database,
    statuses: &[String],
    limit: i64,
) -> Result<Vec<Lead>, LeadhubError> {
    let statuses = serde_json::to_string(statuses).map_err(|e| LeadhubError::Storage {
        source: Box::new(e),
    })?;
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LEAD_COLUMNS} FROM leads
                 WHERE assigned_to IS NULL
                   AND status IN (SELECT value FROM json_each(?1))
                 ORDER BY created_at ASC, rowid ASC
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![statuses, limit], lead_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(map_tr_err)
}

enum LeadClaimRow {
    Missing,
    Claimed(Claim<Lead>),
}

/// Claim an unassigned lead. A lead still in the initial stage moves to `next_status`.
pub async fn assign_lead(
    db: &Database,
    lead_id: &str,
    agent_id: &str,
    next_status: &str,
) -> Result<Claim<Lead>, LeadhubError> {
    let lead_id_owned = lead_id.to_string();
    let agent_id = agent_id.to_string();
    let next_status = next_status.to_string();
    let outcome = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some(lead) = select_lead(&tx, &lead_id_owned)? else {
                return Ok(LeadClaimRow::Missing);
            };
            if lead.assigned_to.is_some() {
                return Ok(LeadClaimRow::Claimed(Claim::AlreadyAssigned(lead)));
            }
            let now = now_timestamp();
            tx.execute(
                "UPDATE leads SET assigned_to = ?2, assigned_at = ?3,
                     status = CASE WHEN status = ?4 THEN ?5 ELSE status END,
                     updated_at = ?3
                 WHERE id = ?1 AND assigned_to IS NULL",
                params![
                    lead.id,
                    agent_id,
                    now,
                    Pipeline::INITIAL_STAGE,
                    next_status
                ],
            )?;
            let updated = select_lead(&tx, &lead.id)?.unwrap_or(lead);
            tx.commit()?;
            Ok(LeadClaimRow::Claimed(Claim::Assigned(updated)))
        })
        .await
        .map_err(map_tr_err)?;

    match outcome {
        LeadClaimRow::Missing => Err(LeadhubError::not_found("lead", lead_id)),
        LeadClaimRow::Claimed(claim) => Ok(claim),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadhub_core::Channel;

    fn profile(phone: &str, name: Option<&str>) -> LeadProfile {
        LeadProfile::inbound(phone, name, Pipeline::HighTicket, Channel::Whatsapp)
    }

    #[tokio::test]
    async fn upsert_creates_then_finds_by_normalized_phone() {
        let db = Database::open_in_memory().await.unwrap();

        let (lead, created) = upsert_lead(&db, profile("+55 11 99999-0000", Some("Ana")))
            .await
            .unwrap();
        assert!(created);
        assert_eq!(lead.phone, "5511999990000");
        assert_eq!(lead.name, "Ana");
        assert_eq!(lead.status, "novo");
        assert_eq!(lead.source, "whatsapp");

        let (again, created) = upsert_lead(&db, profile("5511999990000", None)).await.unwrap();
        assert!(!created);
        assert_eq!(again.id, lead.id);
    }

    #[tokio::test]
    async fn phone_fallback_name_is_replaced_by_profile_name() {
        let db = Database::open_in_memory().await.unwrap();
        let (lead, _) = upsert_lead(&db, profile("5511988887777", None)).await.unwrap();
        assert_eq!(lead.name, "5511988887777");

        let (lead, _) = upsert_lead(&db, profile("5511988887777", Some("Bruno")))
            .await
            .unwrap();
        assert_eq!(lead.name, "Bruno");

        // A real name is never overwritten by a later one.
        let (lead, _) = upsert_lead(&db, profile("5511988887777", Some("B.")))
            .await
            .unwrap();
        assert_eq!(lead.name, "Bruno");
    }

    #[tokio::test]
    async fn assign_lead_is_conditional_and_advances_stage() {
        let db = Database::open_in_memory().await.unwrap();
        let (lead, _) = upsert_lead(&db, profile("5511900000001", None)).await.unwrap();

        let claim = assign_lead(&db, &lead.id, "agent-b", "qualificado")
            .await
            .unwrap();
        let Claim::Assigned(assigned) = claim else {
            panic!("first claim should win");
        };
        assert_eq!(assigned.assigned_to.as_deref(), Some("agent-b"));
        assert_eq!(assigned.status, "qualificado");
        assert!(assigned.assigned_at.is_some());

        let second = assign_lead(&db, &lead.id, "agent-a", "qualificado")
            .await
            .unwrap();
        match second {
            Claim::AlreadyAssigned(current) => {
                assert_eq!(current.assigned_to.as_deref(), Some("agent-b"))
            }
            Claim::Assigned(_) => panic!("second claim must not overwrite"),
        }
    }

    #[tokio::test]
    async fn assign_unknown_lead_is_not_found() {
        let db = Database::open_in_memory().await.unwrap();
        let err = assign_lead(&db, "missing", "agent-a", "qualificado")
            .await
            .unwrap_err();
        assert!(matches!(err, LeadhubError::NotFound { entity: "lead", .. }));
    }

    #[tokio::test]
    async fn assignment_listing_filters_status_and_owner() {
        let db = Database::open_in_memory().await.unwrap();
        let (first, _) = upsert_lead(&db, profile("5511900000001", None)).await.unwrap();
        let (second, _) = upsert_lead(&db, profile("5511900000002", None)).await.unwrap();
        let (third, _) = upsert_lead(&db, profile("5511900000003", None)).await.unwrap();
        assign_lead(&db, &second.id, "agent-a", "qualificado")
            .await
            .unwrap();

        let pending = list_leads_for_assignment(&db, &["novo".to_string()], 10)
            .await
            .unwrap();
        let ids: Vec<_> = pending.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec![first.id.as_str(), third.id.as_str()]);

        let limited = list_leads_for_assignment(&db, &["novo".to_string()], 1)
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);

        let none = list_leads_for_assignment(&db, &["perdido".to_string()], 10)
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
