//! The C entry points the simulator drives: initialize once, take decisions
//! per tick, deinitialize at the end. All state lives in a single slot owned
//! by this module; the out-buffer persists between calls as the ABI demands.

use std::sync::{Mutex, MutexGuard};

use anyhow::Context;
use joule::config::SchedulerConfig;
use joule::engine::Scheduler;

use crate::transfer::{decode_events, encode_decisions, DecisionBatch, WireFormat};
use crate::Result;

/// Messages are bincode-encoded batches.
pub const BATSIM_EDC_FORMAT_BINARY: u32 = 0x1;
/// Messages are JSON batches.
pub const BATSIM_EDC_FORMAT_JSON: u32 = 0x2;

struct EdcState {
    format: WireFormat,
    scheduler: Scheduler,
    /// Last encoded decision batch; must stay valid until the next call.
    out_buf: Vec<u8>,
}

static STATE: Mutex<Option<EdcState>> = Mutex::new(None);

fn state_slot() -> MutexGuard<'static, Option<EdcState>> {
    match STATE.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn parse_format(flags: u32) -> anyhow::Result<WireFormat> {
    if flags & !(BATSIM_EDC_FORMAT_BINARY | BATSIM_EDC_FORMAT_JSON) != 0 {
        anyhow::bail!("unknown format flags {:#x}", flags);
    }
    let binary = flags & BATSIM_EDC_FORMAT_BINARY != 0;
    let json = flags & BATSIM_EDC_FORMAT_JSON != 0;
    match (binary, json) {
        (true, false) => Ok(WireFormat::Binary),
        (false, true) => Ok(WireFormat::Json),
        (true, true) => anyhow::bail!("binary and json format flags are mutually exclusive"),
        (false, false) => anyhow::bail!("no format flag given"),
    }
}

fn init_impl(data: &[u8], flags: u32) -> anyhow::Result<EdcState> {
    let format = parse_format(flags)?;
    let config = SchedulerConfig::from_json(data).context("invalid initialization data")?;
    log::info!("initializing decision component: {:?}", config);
    let scheduler = Scheduler::new(config)?;
    Ok(EdcState {
        format,
        scheduler,
        out_buf: Vec::new(),
    })
}

fn take_decisions_impl(state: &mut EdcState, input: &[u8]) -> Result<()> {
    let batch = decode_events(state.format, input)?;
    let decisions = state.scheduler.take_decisions(batch.now, &batch.events)?;
    let out = DecisionBatch {
        now: batch.now,
        decisions,
    };
    state.out_buf = encode_decisions(state.format, &out)?;
    Ok(())
}

/// # Safety
///
/// `data` must point to `size` readable bytes, or be null with `size == 0`.
#[no_mangle]
pub unsafe extern "C" fn batsim_edc_init(data: *const u8, size: u32, flags: u32) -> u8 {
    // the component is a loaded library: log to stderr, never touch stdout
    let _ = env_logger::Builder::from_default_env()
        .target(env_logger::Target::Stderr)
        .try_init();

    let blob = if data.is_null() || size == 0 {
        &[][..]
    } else {
        std::slice::from_raw_parts(data, size as usize)
    };
    match init_impl(blob, flags) {
        Ok(state) => {
            *state_slot() = Some(state);
            0
        }
        Err(e) => {
            log::error!("cannot initialize decision component: {:#}", e);
            1
        }
    }
}

#[no_mangle]
pub extern "C" fn batsim_edc_deinit() -> u8 {
    *state_slot() = None;
    0
}

/// # Safety
///
/// `what_happened` must point to `what_happened_size` readable bytes;
/// `decisions` and `decisions_size` must be writable. The returned buffer
/// stays valid until the next call into this library.
#[no_mangle]
pub unsafe extern "C" fn batsim_edc_take_decisions(
    what_happened: *const u8,
    what_happened_size: u32,
    decisions: *mut *mut u8,
    decisions_size: *mut u32,
) -> u8 {
    if what_happened.is_null() || decisions.is_null() || decisions_size.is_null() {
        log::error!("null buffer passed to take_decisions");
        return 1;
    }
    let input = std::slice::from_raw_parts(what_happened, what_happened_size as usize);

    let mut slot = state_slot();
    let state = match slot.as_mut() {
        Some(state) => state,
        None => {
            log::error!("take_decisions called on an uninitialized component");
            return 1;
        }
    };
    match take_decisions_impl(state, input) {
        Ok(()) => {
            *decisions = state.out_buf.as_mut_ptr();
            *decisions_size = state.out_buf.len() as u32;
            0
        }
        Err(e) => {
            log::error!("cannot take decisions: {}", e);
            1
        }
    }
}
