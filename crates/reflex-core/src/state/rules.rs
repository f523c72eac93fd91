use std::collections::HashMap;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{ReflexError, Result};
use crate::models::{
    AddAnalysisAction, CanvasPosition, FinalizeAnalysisAction, Operator, ReflexDecision,
    ReflexRule, ReflexTrigger, ResultValue, Rule, RuleGroup,
};
use crate::repository::RuleRepository;

use super::SqliteReflexStore;

const ACTION_ADD: &str = "add";
const ACTION_FINALIZE: &str = "finalize";

impl RuleRepository for SqliteReflexStore {
    fn load(&self, uid: &str) -> Result<Option<ReflexRule>> {
        self.with_conn(|conn| load_rule(conn, uid))
    }

    fn save(&self, rule: &ReflexRule) -> Result<()> {
        self.with_tx(|tx| {
            tx.execute("DELETE FROM reflex_rules WHERE uid = ?1", params![rule.uid])?;
            insert_rule(tx, rule)
        })
    }

    fn delete(&self, uid: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM reflex_rules WHERE uid = ?1", params![uid])?;
            Ok(affected > 0)
        })
    }

    fn list(&self) -> Result<Vec<ReflexRule>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT uid FROM reflex_rules ORDER BY priority ASC, uid ASC")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut uids = Vec::new();
            for row in rows {
                uids.push(row?);
            }

            let mut out = Vec::with_capacity(uids.len());
            for uid in uids {
                if let Some(rule) = load_rule(conn, &uid)? {
                    out.push(rule);
                }
            }
            Ok(out)
        })
    }
}

fn insert_rule(conn: &Connection, rule: &ReflexRule) -> Result<()> {
    conn.execute(
        r"
        INSERT INTO reflex_rules(uid, name, description, is_active, priority, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ",
        params![
            rule.uid,
            rule.name,
            rule.description,
            rule.is_active,
            rule.priority,
            Utc::now().to_rfc3339()
        ],
    )?;

    for (trigger_pos, trigger) in rule.triggers.iter().enumerate() {
        conn.execute(
            r"
            INSERT INTO reflex_triggers(
                rule_uid, uid, position, level, description, sample_type_uid, analysis_uids_json
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
            params![
                rule.uid,
                trigger.uid,
                position(trigger_pos),
                trigger.level,
                trigger.description,
                trigger.sample_type_uid,
                serde_json::to_string(&trigger.analysis_uids)?
            ],
        )?;
        for (decision_pos, decision) in trigger.decisions.iter().enumerate() {
            insert_decision(conn, &rule.uid, &trigger.uid, decision_pos, decision)?;
        }
    }

    for (node_id, point) in &rule.layout {
        conn.execute(
            "INSERT INTO reflex_layout(rule_uid, node_id, x, y) VALUES (?1, ?2, ?3, ?4)",
            params![rule.uid, node_id, point.x, point.y],
        )?;
    }
    Ok(())
}

fn insert_decision(
    conn: &Connection,
    rule_uid: &str,
    trigger_uid: &str,
    decision_pos: usize,
    decision: &ReflexDecision,
) -> Result<()> {
    conn.execute(
        r"
        INSERT INTO reflex_decisions(rule_uid, uid, trigger_uid, position, description, priority)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ",
        params![
            rule_uid,
            decision.uid,
            trigger_uid,
            position(decision_pos),
            decision.description,
            decision.priority
        ],
    )?;

    for (group_pos, group) in decision.rule_groups.iter().enumerate() {
        conn.execute(
            r"
            INSERT INTO reflex_rule_groups(rule_uid, uid, decision_uid, position, description, priority)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                rule_uid,
                group.uid,
                decision.uid,
                position(group_pos),
                group.description,
                group.priority
            ],
        )?;
        for (rule_pos, condition) in group.rules.iter().enumerate() {
            conn.execute(
                r"
                INSERT INTO reflex_group_rules(
                    rule_uid, uid, group_uid, position, analysis_uid, operator, value_json,
                    priority, node_id
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ",
                params![
                    rule_uid,
                    condition.uid,
                    group.uid,
                    position(rule_pos),
                    condition.analysis_uid,
                    condition.operator.as_str(),
                    serde_json::to_string(&condition.value)?,
                    condition.priority,
                    condition.node_id
                ],
            )?;
        }
    }

    let add_count = decision.add_actions.len();
    for (action_pos, action) in decision.add_actions.iter().enumerate() {
        insert_action(
            conn,
            rule_uid,
            &decision.uid,
            action_pos,
            &action.uid,
            ACTION_ADD,
            &action.analysis_uid,
            Some(action.count),
            None,
        )?;
    }
    for (action_pos, action) in decision.finalize_actions.iter().enumerate() {
        insert_action(
            conn,
            rule_uid,
            &decision.uid,
            add_count + action_pos,
            &action.uid,
            ACTION_FINALIZE,
            &action.analysis_uid,
            None,
            Some(serde_json::to_string(&action.value)?),
        )?;
    }
    Ok(())
}

#[allow(
    clippy::too_many_arguments,
    reason = "one column per argument keeps the insert readable"
)]
fn insert_action(
    conn: &Connection,
    rule_uid: &str,
    decision_uid: &str,
    action_pos: usize,
    uid: &str,
    action_type: &str,
    analysis_uid: &str,
    count: Option<u32>,
    value_json: Option<String>,
) -> Result<()> {
    conn.execute(
        r"
        INSERT INTO reflex_actions(
            rule_uid, uid, decision_uid, position, action_type, analysis_uid, count, value_json
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ",
        params![
            rule_uid,
            uid,
            decision_uid,
            position(action_pos),
            action_type,
            analysis_uid,
            count,
            value_json
        ],
    )?;
    Ok(())
}

fn load_rule(conn: &Connection, uid: &str) -> Result<Option<ReflexRule>> {
    let head = conn
        .query_row(
            "SELECT uid, name, description, is_active, priority FROM reflex_rules WHERE uid = ?1",
            params![uid],
            |row| {
                Ok(ReflexRule {
                    uid: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    is_active: row.get(3)?,
                    priority: row.get(4)?,
                    ..ReflexRule::default()
                })
            },
        )
        .optional()?;
    let Some(mut rule) = head else {
        return Ok(None);
    };

    let mut conditions = load_conditions(conn, uid)?;
    let mut actions = load_actions(conn, uid)?;

    let mut groups: HashMap<String, Vec<RuleGroup>> = HashMap::new();
    {
        let mut stmt = conn.prepare(
            r"
            SELECT uid, decision_uid, description, priority
            FROM reflex_rule_groups
            WHERE rule_uid = ?1
            ORDER BY position ASC
            ",
        )?;
        let rows = stmt.query_map(params![uid], |row| {
            Ok((
                row.get::<_, String>(1)?,
                RuleGroup {
                    uid: row.get(0)?,
                    description: row.get(2)?,
                    priority: row.get(3)?,
                    rules: Vec::new(),
                },
            ))
        })?;
        for row in rows {
            let (decision_uid, mut group) = row?;
            group.rules = conditions.remove(&group.uid).unwrap_or_default();
            groups.entry(decision_uid).or_default().push(group);
        }
    }

    let mut decisions: HashMap<String, Vec<ReflexDecision>> = HashMap::new();
    {
        let mut stmt = conn.prepare(
            r"
            SELECT uid, trigger_uid, description, priority
            FROM reflex_decisions
            WHERE rule_uid = ?1
            ORDER BY position ASC
            ",
        )?;
        let rows = stmt.query_map(params![uid], |row| {
            Ok((
                row.get::<_, String>(1)?,
                ReflexDecision {
                    uid: row.get(0)?,
                    description: row.get(2)?,
                    priority: row.get(3)?,
                    ..ReflexDecision::default()
                },
            ))
        })?;
        for row in rows {
            let (trigger_uid, mut decision) = row?;
            decision.rule_groups = groups.remove(&decision.uid).unwrap_or_default();
            if let Some((adds, finalizes)) = actions.remove(&decision.uid) {
                decision.add_actions = adds;
                decision.finalize_actions = finalizes;
            }
            decisions.entry(trigger_uid).or_default().push(decision);
        }
    }

    let mut stmt = conn.prepare(
        r"
        SELECT uid, level, description, sample_type_uid, analysis_uids_json
        FROM reflex_triggers
        WHERE rule_uid = ?1
        ORDER BY position ASC
        ",
    )?;
    let rows = stmt.query_map(params![uid], |row| {
        Ok((
            ReflexTrigger {
                uid: row.get(0)?,
                level: row.get(1)?,
                description: row.get(2)?,
                sample_type_uid: row.get(3)?,
                ..ReflexTrigger::default()
            },
            row.get::<_, String>(4)?,
        ))
    })?;
    for row in rows {
        let (mut trigger, analysis_uids_json) = row?;
        trigger.analysis_uids = serde_json::from_str(&analysis_uids_json)?;
        trigger.decisions = decisions.remove(&trigger.uid).unwrap_or_default();
        rule.triggers.push(trigger);
    }

    let mut stmt =
        conn.prepare("SELECT node_id, x, y FROM reflex_layout WHERE rule_uid = ?1")?;
    let rows = stmt.query_map(params![uid], |row| {
        Ok((
            row.get::<_, String>(0)?,
            CanvasPosition {
                x: row.get(1)?,
                y: row.get(2)?,
            },
        ))
    })?;
    for row in rows {
        let (node_id, point) = row?;
        rule.layout.insert(node_id, point);
    }

    Ok(Some(rule))
}

fn load_conditions(conn: &Connection, rule_uid: &str) -> Result<HashMap<String, Vec<Rule>>> {
    let mut stmt = conn.prepare(
        r"
        SELECT uid, group_uid, analysis_uid, operator, value_json, priority, node_id
        FROM reflex_group_rules
        WHERE rule_uid = ?1
        ORDER BY position ASC
        ",
    )?;
    let rows = stmt.query_map(params![rule_uid], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, i64>(5)?,
            row.get::<_, Option<String>>(6)?,
        ))
    })?;

    let mut out: HashMap<String, Vec<Rule>> = HashMap::new();
    for row in rows {
        let (uid, group_uid, analysis_uid, operator, value_json, priority, node_id) = row?;
        let operator = operator
            .parse::<Operator>()
            .map_err(|err| ReflexError::Validation(format!("stored rule {uid}: {err}")))?;
        out.entry(group_uid).or_default().push(Rule {
            uid,
            analysis_uid,
            operator,
            value: serde_json::from_str(&value_json)?,
            priority,
            node_id,
        });
    }
    Ok(out)
}

type DecisionActions = (Vec<AddAnalysisAction>, Vec<FinalizeAnalysisAction>);

fn load_actions(conn: &Connection, rule_uid: &str) -> Result<HashMap<String, DecisionActions>> {
    let mut stmt = conn.prepare(
        r"
        SELECT uid, decision_uid, action_type, analysis_uid, count, value_json
        FROM reflex_actions
        WHERE rule_uid = ?1
        ORDER BY position ASC
        ",
    )?;
    let rows = stmt.query_map(params![rule_uid], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, Option<u32>>(4)?,
            row.get::<_, Option<String>>(5)?,
        ))
    })?;

    let mut out: HashMap<String, DecisionActions> = HashMap::new();
    for row in rows {
        let (uid, decision_uid, action_type, analysis_uid, count, value_json) = row?;
        let slot = out.entry(decision_uid).or_default();
        match action_type.as_str() {
            ACTION_ADD => slot.0.push(AddAnalysisAction {
                uid,
                analysis_uid,
                count: count.unwrap_or(1),
            }),
            ACTION_FINALIZE => {
                let value = match value_json {
                    Some(raw) => serde_json::from_str::<ResultValue>(&raw)?,
                    None => ResultValue::default(),
                };
                slot.1.push(FinalizeAnalysisAction {
                    uid,
                    analysis_uid,
                    value,
                });
            }
            other => {
                return Err(ReflexError::Validation(format!(
                    "stored action {uid} has unknown type '{other}'"
                )));
            }
        }
    }
    Ok(out)
}

fn position(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}
