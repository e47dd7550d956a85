//! Static ABI encoding for the handful of contract reads the engine needs.
//!
//! All return types are static tuples (or a dynamic array of static structs),
//! so decoding is a walk over 32-byte words.

use crate::domain::{
    AppError, BetRecord, ContractError, ContractStats, GameStatus, types::is_valid_address,
};

/// `getGameStatus(address)`
pub const GET_GAME_STATUS: [u8; 4] = [0x54, 0xe4, 0x43, 0x7e];
/// `getBetHistory(address)`
pub const GET_BET_HISTORY: [u8; 4] = [0xce, 0x84, 0xa5, 0x3b];
/// `getContractStats()`
pub const GET_CONTRACT_STATS: [u8; 4] = [0xdf, 0xe6, 0xb5, 0xd6];
/// `balanceOf(address)`
pub const BALANCE_OF: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

const WORD: usize = 32;
const GAME_STATUS_WORDS: usize = 12;
const BET_RECORD_WORDS: usize = 5;

type Word = [u8; WORD];

/// Calldata for a function taking no arguments
pub fn encode_call(selector: [u8; 4]) -> String {
    format!("0x{}", hex::encode(selector))
}

/// Calldata for a function taking a single `address`
pub fn encode_address_call(selector: [u8; 4], address: &str) -> Result<String, AppError> {
    if !is_valid_address(address) {
        return Err(AppError::Contract(ContractError::InvalidAddress(
            address.to_string(),
        )));
    }
    let raw = hex::decode(&address[2..])
        .map_err(|e| AppError::Contract(ContractError::InvalidAddress(e.to_string())))?;

    let mut data = Vec::with_capacity(4 + WORD);
    data.extend_from_slice(&selector);
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(&raw);
    Ok(format!("0x{}", hex::encode(data)))
}

/// Split `0x`-prefixed return data into words
pub fn decode_words(data: &str) -> Result<Vec<Word>, AppError> {
    let hex_data = data.strip_prefix("0x").unwrap_or(data);
    let bytes = hex::decode(hex_data).map_err(|e| decode_err(e.to_string()))?;
    if bytes.len() % WORD != 0 {
        return Err(decode_err(format!(
            "return data length {} is not word aligned",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(WORD)
        .map(|chunk| {
            let mut word = [0u8; WORD];
            word.copy_from_slice(chunk);
            word
        })
        .collect())
}

fn decode_err(message: impl Into<String>) -> AppError {
    AppError::Contract(ContractError::Decode(message.into()))
}

fn word_to_u128(word: &Word) -> Result<u128, AppError> {
    if word[..16].iter().any(|b| *b != 0) {
        return Err(decode_err("uint256 value exceeds u128"));
    }
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(buf))
}

fn word_to_u64(word: &Word) -> Result<u64, AppError> {
    u64::try_from(word_to_u128(word)?).map_err(|_| decode_err("value exceeds u64"))
}

fn word_to_u8(word: &Word) -> Result<u8, AppError> {
    u8::try_from(word_to_u128(word)?).map_err(|_| decode_err("value exceeds u8"))
}

fn word_to_bool(word: &Word) -> Result<bool, AppError> {
    match word_to_u128(word)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(decode_err(format!("invalid bool {other}"))),
    }
}

fn word_to_usize(word: &Word) -> Result<usize, AppError> {
    usize::try_from(word_to_u64(word)?).map_err(|_| decode_err("offset exceeds usize"))
}

/// Decode `getGameStatus` return data
pub fn decode_game_status(data: &str) -> Result<GameStatus, AppError> {
    let words = decode_words(data)?;
    if words.len() < GAME_STATUS_WORDS {
        return Err(decode_err(format!(
            "expected {GAME_STATUS_WORDS} words, got {}",
            words.len()
        )));
    }

    Ok(GameStatus {
        is_active: word_to_bool(&words[0])?,
        is_win: word_to_bool(&words[1])?,
        is_completed: word_to_bool(&words[2])?,
        chosen_number: word_to_u8(&words[3])?,
        amount: word_to_u128(&words[4])?,
        result: word_to_u8(&words[5])?,
        payout: word_to_u128(&words[6])?,
        // uint256 request ids routinely use all 32 bytes
        request_id: format!("0x{}", hex::encode(words[7])),
        request_exists: word_to_bool(&words[8])?,
        request_processed: word_to_bool(&words[9])?,
        recovery_eligible: word_to_bool(&words[10])?,
        last_play_timestamp: word_to_u64(&words[11])?,
    })
}

/// Decode `getBetHistory` return data (a dynamic array of static structs)
pub fn decode_bet_history(data: &str) -> Result<Vec<BetRecord>, AppError> {
    let words = decode_words(data)?;
    let Some(offset_word) = words.first() else {
        return Err(decode_err("empty return data"));
    };

    let offset = word_to_usize(offset_word)?;
    if offset % WORD != 0 {
        return Err(decode_err("array offset is not word aligned"));
    }
    let start = offset / WORD;
    let len = words
        .get(start)
        .ok_or_else(|| decode_err("array length out of bounds"))
        .and_then(word_to_usize)?;

    let body = &words[start + 1..];
    let needed = len
        .checked_mul(BET_RECORD_WORDS)
        .ok_or_else(|| decode_err(format!("array length {len} overflows")))?;
    if body.len() < needed {
        return Err(decode_err(format!(
            "expected {} bet records, data holds {}",
            len,
            body.len() / BET_RECORD_WORDS
        )));
    }

    body.chunks_exact(BET_RECORD_WORDS)
        .take(len)
        .map(|record| {
            Ok(BetRecord {
                chosen_number: word_to_u8(&record[0])?,
                rolled_number: word_to_u8(&record[1])?,
                timestamp: word_to_u64(&record[2])?,
                amount: word_to_u128(&record[3])?,
                payout: word_to_u128(&record[4])?,
            })
        })
        .collect()
}

/// Decode `getContractStats` return data
pub fn decode_contract_stats(data: &str) -> Result<ContractStats, AppError> {
    let words = decode_words(data)?;
    if words.len() < 4 {
        return Err(decode_err(format!("expected 4 words, got {}", words.len())));
    }
    Ok(ContractStats {
        total_games: word_to_u64(&words[0])?,
        total_volume: word_to_u128(&words[1])?,
        total_payouts: word_to_u128(&words[2])?,
        house_balance: word_to_u128(&words[3])?,
    })
}

/// Decode a single `uint256` return value
pub fn decode_uint(data: &str) -> Result<u128, AppError> {
    let words = decode_words(data)?;
    words
        .first()
        .ok_or_else(|| decode_err("empty return data"))
        .and_then(word_to_u128)
}
