use anchor_lang::prelude::*;
use serde::Serialize;

use crate::cipher::{open, KeyProvider};
use crate::error::LedgerError;
use crate::state::*;
use crate::store::Tables;

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstantWinCheck {
    pub is_winner: bool,
    pub instant_win_id: Option<InstantWinId>,
    pub prize_id: Option<PrizeId>,
    pub prize_name: Option<String>,
}

impl InstantWinCheck {
    fn no_win() -> Self {
        Self {
            is_winner: false,
            instant_win_id: None,
            prize_id: None,
            prize_name: None,
        }
    }
}

/// Decrypts a sealed record and checks it describes the row it sits in.
pub(crate) fn open_payload(key: &[u8; 32], instant_win: &InstantWin) -> Result<InstantWinPayload> {
    let plaintext = open(
        key,
        instant_win.competition_id.as_bytes(),
        &instant_win.encrypted_data,
    )?;
    let payload: InstantWinPayload = serde_json::from_slice(&plaintext)
        .map_err(|_| error!(LedgerError::SealedRecordCorrupted))?;
    require!(
        payload.position == instant_win.position
            && payload.competition_id == instant_win.competition_id
            && payload.prize_id == instant_win.prize_id,
        LedgerError::SealedRecordCorrupted
    );
    Ok(payload)
}

/// Does this ticket number sit on an unclaimed instant-win position?
///
/// A record that fails to decrypt or disagrees with its row is reported as
/// no win and logged as an integrity fault.
pub fn process_check_instant_win(
    tables: &Tables,
    keys: &dyn KeyProvider,
    competition_id: &str,
    ticket_number: &str,
) -> Result<InstantWinCheck> {
    tables.competition(competition_id)?;
    let position =
        ticket_position(ticket_number).ok_or_else(|| error!(LedgerError::InvalidTicketNumber))?;

    let instant_win = match tables.instant_win_at(competition_id, position) {
        Some(iw) if !iw.is_claimed => iw,
        _ => return Ok(InstantWinCheck::no_win()),
    };

    let key = keys.instant_win_key()?;
    match open_payload(&key, instant_win) {
        Ok(payload) => Ok(InstantWinCheck {
            is_winner: true,
            instant_win_id: Some(instant_win.id.clone()),
            prize_name: tables.prize(&payload.prize_id).ok().map(|p| p.name.clone()),
            prize_id: Some(payload.prize_id),
        }),
        Err(_) => {
            tracing::error!(
                instant_win_id = %instant_win.id,
                competition_id,
                "integrity fault: sealed instant win failed to open"
            );
            Ok(InstantWinCheck::no_win())
        }
    }
}
