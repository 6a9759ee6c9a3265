// src/services/join.rs
//
// Relational join engine: pure, in-memory composition over already-converged
// DTO lists. No I/O and no fallback decisions happen here; the convergent
// readers did that before these functions run. Nothing in this module throws;
// a failed join degrades to an empty field.

use serde::Serialize;

use crate::convergence::normalize::{normalize_company_name, parse_timestamp};
use crate::models::company::Company;
use crate::models::contact::{Contact, PotentialContact};
use crate::models::event::EventLog;
use crate::models::opportunity::{ContactOpportunityLink, Interaction, Opportunity};

// ---------------------------------------------------------------------------
// Name-based joins
// ---------------------------------------------------------------------------

/// Company lookup by free-text name. Both sides go through the shared
/// normalizer; a join with a raw comparison would silently miss.
pub fn company_by_name<'a>(companies: &'a [Company], name: &str) -> Option<&'a Company> {
    let wanted = normalize_company_name(name);
    if wanted.is_empty() {
        return None;
    }
    companies
        .iter()
        .find(|c| normalize_company_name(&c.company_name) == wanted)
}

/// Opportunities belonging to a company, joined by normalized free-text name
/// (opportunities reference companies by name, not id).
pub fn opportunities_of<'a>(
    opportunities: &'a [Opportunity],
    company_name: &str,
) -> Vec<&'a Opportunity> {
    let wanted = normalize_company_name(company_name);
    if wanted.is_empty() {
        return Vec::new();
    }
    opportunities
        .iter()
        .filter(|o| normalize_company_name(&o.customer_company) == wanted)
        .collect()
}

// ---------------------------------------------------------------------------
// Aggregate views
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDetails {
    /// `None` with empty relation arrays when the lookup missed: an empty
    /// shell, so downstream rendering degrades instead of erroring.
    pub company: Option<Company>,
    pub contacts: Vec<Contact>,
    pub opportunities: Vec<Opportunity>,
    pub last_activity_time: Option<String>,
}

impl CompanyDetails {
    pub fn empty() -> Self {
        Self { company: None, contacts: Vec::new(), opportunities: Vec::new(), last_activity_time: None }
    }
}

pub fn company_details(
    key: &str,
    companies: &[Company],
    contacts: &[Contact],
    opportunities: &[Opportunity],
    interactions: &[Interaction],
    events: &[EventLog],
) -> CompanyDetails {
    let company = companies
        .iter()
        .find(|c| c.company_id == key)
        .or_else(|| company_by_name(companies, key));
    let Some(company) = company else {
        return CompanyDetails::empty();
    };

    let related_contacts: Vec<Contact> = contacts
        .iter()
        .filter(|c| c.company_id == company.company_id)
        .cloned()
        .collect();
    let related_opportunities: Vec<Opportunity> = opportunities_of(opportunities, &company.company_name)
        .into_iter()
        .cloned()
        .collect();
    let last_activity_time =
        last_activity_time(company, &related_opportunities, interactions, events);

    CompanyDetails {
        company: Some(company.clone()),
        contacts: related_contacts,
        opportunities: related_opportunities,
        last_activity_time,
    }
}

/// Maximum parseable activity timestamp for a company: interactions tied to
/// it directly or through its opportunities, plus its event logs. Unparseable
/// dates are skipped. No activity at all falls back to the company's own
/// creation timestamp.
pub fn last_activity_time(
    company: &Company,
    company_opportunities: &[Opportunity],
    interactions: &[Interaction],
    events: &[EventLog],
) -> Option<String> {
    let opportunity_ids: Vec<&str> = company_opportunities
        .iter()
        .map(|o| o.opportunity_id.as_str())
        .filter(|id| !id.is_empty())
        .collect();

    let interaction_times = interactions
        .iter()
        .filter(|i| {
            (!company.company_id.is_empty() && i.company_id == company.company_id)
                || opportunity_ids.contains(&i.opportunity_id.as_str())
        })
        .map(|i| i.interaction_time.as_str());
    let event_times = events
        .iter()
        .filter(|e| !company.company_id.is_empty() && e.related_company_id == company.company_id)
        .map(|e| e.event_time.as_str());

    interaction_times
        .chain(event_times)
        .filter_map(|s| parse_timestamp(s).map(|t| (t, s)))
        .max_by_key(|(t, _)| *t)
        .map(|(_, s)| s.to_string())
        .or_else(|| company.created_time.clone())
}

// ---------------------------------------------------------------------------
// Cascading job-title resolution
// ---------------------------------------------------------------------------

/// Given a person's name, resolve a job title by cascading lookup: linked
/// official contacts first, then potential contacts scoped to the same
/// normalized company, then potential contacts whose company merely overlaps.
/// First non-empty value wins; no match resolves to `""`, never an error.
pub fn resolve_job_title(
    name: &str,
    company_name: &str,
    linked_contacts: &[Contact],
    potentials: &[PotentialContact],
) -> String {
    if name.is_empty() {
        return String::new();
    }

    if let Some(contact) = linked_contacts
        .iter()
        .find(|c| c.name == name && !c.job_title.is_empty())
    {
        return contact.job_title.clone();
    }

    let wanted = normalize_company_name(company_name);
    if !wanted.is_empty() {
        if let Some(potential) = potentials.iter().find(|p| {
            p.name == name
                && !p.job_title.is_empty()
                && normalize_company_name(&p.company_name) == wanted
        }) {
            return potential.job_title.clone();
        }

        if let Some(potential) = potentials.iter().find(|p| {
            let theirs = normalize_company_name(&p.company_name);
            p.name == name
                && !p.job_title.is_empty()
                && (theirs.contains(&wanted) || wanted.contains(&theirs))
        }) {
            return potential.job_title.clone();
        }
    }

    String::new()
}

// ---------------------------------------------------------------------------
// Opportunity aggregates
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedContact {
    #[serde(flatten)]
    pub contact: Contact,
    pub resolved_job_title: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityDetails {
    pub opportunity: Option<Opportunity>,
    pub company: Option<Company>,
    pub contacts: Vec<LinkedContact>,
    pub interactions: Vec<Interaction>,
    pub events: Vec<EventLog>,
    pub parent: Option<Opportunity>,
    pub children: Vec<Opportunity>,
}

impl OpportunityDetails {
    pub fn empty() -> Self {
        Self {
            opportunity: None,
            company: None,
            contacts: Vec::new(),
            interactions: Vec::new(),
            events: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn opportunity_details(
    id: &str,
    opportunities: &[Opportunity],
    companies: &[Company],
    contacts: &[Contact],
    potentials: &[PotentialContact],
    links: &[ContactOpportunityLink],
    interactions: &[Interaction],
    events: &[EventLog],
) -> OpportunityDetails {
    let Some(opportunity) = opportunities.iter().find(|o| o.opportunity_id == id) else {
        return OpportunityDetails::empty();
    };

    let company = company_by_name(companies, &opportunity.customer_company);

    let linked: Vec<Contact> = links
        .iter()
        .filter(|l| l.opportunity_id == opportunity.opportunity_id && l.is_active())
        .filter_map(|l| contacts.iter().find(|c| c.contact_id == l.contact_id))
        .cloned()
        .collect();
    let linked_contacts: Vec<LinkedContact> = linked
        .iter()
        .map(|c| {
            let resolved = if c.job_title.is_empty() {
                resolve_job_title(&c.name, &opportunity.customer_company, &linked, potentials)
            } else {
                c.job_title.clone()
            };
            LinkedContact { contact: c.clone(), resolved_job_title: resolved }
        })
        .collect();

    let related_interactions: Vec<Interaction> = interactions
        .iter()
        .filter(|i| i.opportunity_id == opportunity.opportunity_id)
        .cloned()
        .collect();
    let related_events: Vec<EventLog> = company
        .map(|c| {
            events
                .iter()
                .filter(|e| e.related_company_id == c.company_id)
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    let parent = (!opportunity.parent_opportunity_id.is_empty())
        .then(|| {
            opportunities
                .iter()
                .find(|o| o.opportunity_id == opportunity.parent_opportunity_id)
                .cloned()
        })
        .flatten();
    let children = children_of(opportunities, &opportunity.opportunity_id);

    OpportunityDetails {
        opportunity: Some(opportunity.clone()),
        company: company.cloned(),
        contacts: linked_contacts,
        interactions: related_interactions,
        events: related_events,
        parent,
        children,
    }
}

/// Direct children, resolved by a single foreign-key scan.
pub fn children_of(opportunities: &[Opportunity], parent_id: &str) -> Vec<Opportunity> {
    if parent_id.is_empty() {
        return Vec::new();
    }
    opportunities
        .iter()
        .filter(|o| o.parent_opportunity_id == parent_id)
        .cloned()
        .collect()
}

/// Would re-parenting `child_id` under `new_parent_id` close a cycle? Walks
/// the prospective parent chain upward; the visited set guards against
/// pre-existing loops in the data.
pub fn creates_cycle(opportunities: &[Opportunity], child_id: &str, new_parent_id: &str) -> bool {
    if new_parent_id.is_empty() {
        return false;
    }
    let mut visited: Vec<&str> = Vec::new();
    let mut current = new_parent_id;
    loop {
        if current == child_id {
            return true;
        }
        if visited.contains(&current) {
            return false;
        }
        visited.push(current);
        match opportunities
            .iter()
            .find(|o| o.opportunity_id == current)
            .map(|o| o.parent_opportunity_id.as_str())
        {
            Some(parent) if !parent.is_empty() => current = parent,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company(id: &str, name: &str, created: Option<&str>) -> Company {
        Company {
            company_id: id.into(),
            company_name: name.into(),
            created_time: created.map(String::from),
            ..Default::default()
        }
    }

    fn opportunity(id: &str, name: &str, customer: &str, parent: &str) -> Opportunity {
        Opportunity {
            opportunity_id: id.into(),
            opportunity_name: name.into(),
            customer_company: customer.into(),
            parent_opportunity_id: parent.into(),
            ..Default::default()
        }
    }

    #[test]
    fn name_join_is_symmetric_across_spellings() {
        let companies = vec![company("COMP_1", "台灣科技股份有限公司", None)];
        let by_full = company_by_name(&companies, "台灣科技股份有限公司").unwrap();
        let by_note = company_by_name(&companies, "台灣科技(Taiwan)").unwrap();
        assert_eq!(by_full.company_id, by_note.company_id);
    }

    #[test]
    fn last_activity_takes_the_max_parseable_timestamp() {
        let c = company("COMP_1", "台灣科技", Some("2025-01-01T00:00:00Z"));
        let opps = vec![opportunity("OPP_1", "案A", "台灣科技", "")];
        let interactions = vec![
            Interaction {
                interaction_id: "I1".into(),
                opportunity_id: "OPP_1".into(),
                interaction_time: "2026-03-01 10:00:00".into(),
                ..Default::default()
            },
            Interaction {
                interaction_id: "I2".into(),
                company_id: "COMP_1".into(),
                interaction_time: "definitely not a date".into(),
                ..Default::default()
            },
        ];
        let events = vec![EventLog {
            event_id: "E1".into(),
            related_company_id: "COMP_1".into(),
            event_time: "2026-02-01".into(),
            ..Default::default()
        }];

        let last = last_activity_time(&c, &opps, &interactions, &events);
        assert_eq!(last.as_deref(), Some("2026-03-01 10:00:00"));
    }

    #[test]
    fn last_activity_falls_back_to_company_creation() {
        let c = company("COMP_1", "台灣科技", Some("2025-01-01T00:00:00Z"));
        let last = last_activity_time(&c, &[], &[], &[]);
        assert_eq!(last.as_deref(), Some("2025-01-01T00:00:00Z"));
    }

    #[test]
    fn job_title_cascade_prefers_linked_then_scoped_potentials() {
        let linked = vec![Contact {
            contact_id: "CONT_1".into(),
            name: "王小明".into(),
            job_title: "採購經理".into(),
            ..Default::default()
        }];
        let potentials = vec![
            PotentialContact {
                name: "王小明".into(),
                company_name: "台灣科技有限公司".into(),
                job_title: "業務".into(),
                ..Default::default()
            },
            PotentialContact {
                name: "李大華".into(),
                company_name: "台灣科技(Taiwan)".into(),
                job_title: "工程師".into(),
                ..Default::default()
            },
        ];

        assert_eq!(resolve_job_title("王小明", "台灣科技", &linked, &potentials), "採購經理");
        assert_eq!(resolve_job_title("李大華", "台灣科技", &linked, &potentials), "工程師");
        assert_eq!(resolve_job_title("陳無名", "台灣科技", &linked, &potentials), "");
    }

    #[test]
    fn details_return_an_empty_shell_on_miss() {
        let details = company_details("nope", &[], &[], &[], &[], &[]);
        assert!(details.company.is_none());
        assert!(details.contacts.is_empty());
        assert!(details.opportunities.is_empty());
        assert_eq!(details.last_activity_time, None);
    }

    #[test]
    fn opportunity_details_join_links_and_tree() {
        let opps = vec![
            opportunity("OPP_1", "母案", "台灣科技", ""),
            opportunity("OPP_2", "子案", "台灣科技", "OPP_1"),
        ];
        let companies = vec![company("COMP_1", "台灣科技股份有限公司", None)];
        let contacts = vec![Contact {
            contact_id: "CONT_1".into(),
            name: "王小明".into(),
            company_id: "COMP_1".into(),
            ..Default::default()
        }];
        // No status field on the link row: legacy tolerance, implicitly active.
        let links = vec![ContactOpportunityLink {
            contact_id: "CONT_1".into(),
            opportunity_id: "OPP_1".into(),
            status: String::new(),
        }];
        let potentials = vec![PotentialContact {
            name: "王小明".into(),
            company_name: "台灣科技".into(),
            job_title: "廠長".into(),
            ..Default::default()
        }];

        let details =
            opportunity_details("OPP_1", &opps, &companies, &contacts, &potentials, &links, &[], &[]);
        assert_eq!(details.company.as_ref().unwrap().company_id, "COMP_1");
        assert_eq!(details.contacts.len(), 1);
        assert_eq!(details.contacts[0].resolved_job_title, "廠長");
        assert_eq!(details.children.len(), 1);
        assert_eq!(details.children[0].opportunity_id, "OPP_2");
    }

    #[test]
    fn cycle_detection_walks_the_parent_chain() {
        let opps = vec![
            opportunity("A", "a", "x", ""),
            opportunity("B", "b", "x", "A"),
            opportunity("C", "c", "x", "B"),
        ];
        // A -> B -> C; re-parenting A under C would close the loop.
        assert!(creates_cycle(&opps, "A", "C"));
        assert!(creates_cycle(&opps, "A", "A"));
        assert!(!creates_cycle(&opps, "C", "A"));
        assert!(!creates_cycle(&opps, "A", ""));
    }
}
