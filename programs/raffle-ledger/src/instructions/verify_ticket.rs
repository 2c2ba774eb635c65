use anchor_lang::prelude::*;
use serde::Serialize;

use crate::instructions::{entry_hash_valid, process_verify_range, RangeVerification};
use crate::state::*;
use crate::store::Tables;

/// Three independent facets: the entry's own hash, the chain around it,
/// and whether the entry actually describes this ticket.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TicketVerification {
    pub ticket_id: TicketId,
    pub is_valid: bool,
    pub chain_sequence: Option<u64>,
    pub hash_valid: bool,
    pub chain_valid: bool,
    pub data_matches: bool,
    pub entry: Option<ChainEntry>,
    pub neighbourhood: Option<RangeVerification>,
    pub errors: Vec<String>,
}

pub fn process_verify_ticket(tables: &Tables, ticket_id: &str, neighbourhood: u64) -> Result<TicketVerification> {
    let ticket = tables.ticket(ticket_id)?;
    let mut result = TicketVerification {
        ticket_id: ticket.id.clone(),
        is_valid: false,
        chain_sequence: ticket.chain_sequence,
        hash_valid: false,
        chain_valid: false,
        data_matches: false,
        entry: None,
        neighbourhood: None,
        errors: Vec::new(),
    };

    let Some(sequence) = ticket.chain_sequence else {
        result.errors.push("Ticket was never recorded on the chain".to_string());
        return Ok(result);
    };
    let Some(entry) = tables.entry(sequence) else {
        result
            .errors
            .push(format!("Chain entry {} does not exist", sequence));
        return Ok(result);
    };

    result.hash_valid = entry_hash_valid(entry);
    if !result.hash_valid {
        result
            .errors
            .push(format!("Entry {} hash does not match its contents", sequence));
    }

    let window = process_verify_range(
        tables,
        Some(sequence.saturating_sub(neighbourhood).max(1)),
        Some(sequence.saturating_add(neighbourhood)),
    );
    result.chain_valid = window.is_valid;
    result.errors.extend(window.errors.iter().cloned());
    result.neighbourhood = Some(window);

    result.data_matches = match &entry.data {
        EntryData::TicketPurchase(d) => {
            d.ticket_id == ticket.id
                && d.ticket_number == ticket.ticket_number
                && d.competition_id == ticket.competition_id
        }
        _ => false,
    };
    if !result.data_matches {
        result
            .errors
            .push(format!("Entry {} does not describe ticket {}", sequence, ticket.id));
    }

    result.is_valid = result.hash_valid && result.chain_valid && result.data_matches;
    result.entry = Some(entry.clone());
    Ok(result)
}
