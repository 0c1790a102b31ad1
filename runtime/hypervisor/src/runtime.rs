//! Hypercall-page backend
//!
//! Issues the event channel and scheduler hypercalls through entry points
//! exported by the boot layer. The boot layer owns the hypercall page and
//! the calling convention; this module only encodes the arguments.

use core::ffi::{c_int, c_long, c_void};

use crate::{EventChannel, Hypercalls};

/// `EVTCHNOP_send`: notify the remote end of an event channel
const EVTCHNOP_SEND: c_int = 4;

/// `SCHEDOP_yield`: give up the vCPU, stay runnable
const SCHEDOP_YIELD: c_int = 0;

/// Argument block for `EVTCHNOP_send`
#[repr(C)]
struct EvtchnSend {
    port: u32,
}

extern "C" {
    fn HYPERVISOR_event_channel_op(cmd: c_int, arg: *mut c_void) -> c_long;
    fn HYPERVISOR_sched_op(cmd: c_int, arg: *mut c_void) -> c_long;
}

/// Hypercalls through the boot layer's hypercall page
#[derive(Debug, Clone, Copy, Default)]
pub struct XenHypercalls;

impl XenHypercalls {
    pub const fn new() -> Self {
        Self
    }
}

impl Hypercalls for XenHypercalls {
    fn event_channel_send(&self, port: EventChannel) {
        let mut op = EvtchnSend { port: port.port() };
        // SAFETY: `op` outlives the call and has the layout the hypervisor
        // expects. The result is deliberately ignored: the notification is
        // fire-and-forget and resent on the next transfer anyway.
        let _ = unsafe {
            HYPERVISOR_event_channel_op(EVTCHNOP_SEND, (&mut op as *mut EvtchnSend).cast())
        };
    }

    fn sched_yield(&self) {
        // SAFETY: SCHEDOP_yield takes no argument block.
        let _ = unsafe { HYPERVISOR_sched_op(SCHEDOP_YIELD, core::ptr::null_mut()) };
    }
}
