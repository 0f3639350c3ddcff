//! The dynamic instance: created at fetch, identified by a monotonically
//! increasing per-processor tag (spec §3 "Dynamic Instance").

use crate::common::error::ExceptionKind;
use crate::isa::StaticInstruction;

/// Unique, monotonically increasing per-processor instruction tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Tag(pub u64);

/// Structural-dependence phase an instance passes through during rename
/// (spec §4.1 `strucdep` state machine). Numbered exactly as spec.md does
/// so the mapping back to the specification is direct.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrucDep {
    /// 0: renamed.
    Renamed,
    /// 1: needs FP destination register.
    NeedsFpDest,
    /// 2: needs INT destination register (or pair-first half).
    NeedsIntDest,
    /// 3: needs active-list slot (destination).
    NeedsAlSlotDest,
    /// 4: INT dest is `%g0`, still needs an active-list slot.
    IntDestZeroNeedsAlSlot,
    /// 5: needs CC or pair-second register.
    NeedsCcOrPairSecond,
    /// 6: needs active-list slot for CC/pair-second.
    NeedsAlSlotCc,
    /// 10: memory instance that still needs a memory-queue slot.
    NeedsMemQueueSlot,
}

/// `memprogress` states (spec §3): encodes both the unissued/issued/
/// completed/flushed lifecycle and, for forwarded loads, the forwarding
/// store's tag via `ForwardedFrom`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MemProgress {
    /// 0: unissued.
    #[default]
    Unissued,
    /// -1: issued to cache.
    IssuedToCache,
    /// -(3+tag): forwarded from a store with this tag.
    ForwardedFrom(Tag),
    /// 1: completed.
    Completed,
    /// 2: flushed.
    Flushed,
}

/// Miss classification returned by the cache port on completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MissType {
    /// No memory operation / not applicable.
    #[default]
    None,
    /// L1 hit.
    L1Hit,
    /// L2 hit.
    L2Hit,
    /// Serviced from local memory.
    LocalMem,
    /// Serviced from remote memory (NUMA/remote node).
    RemoteMem,
    /// Late prefetch: the demand access raced ahead of its own prefetch.
    LatePrefetch,
}

/// Per-instance register value, tagged by the class it was produced as.
/// A plain union in the original C++; represented here as an enum so reads
/// cannot observe uninitialized bit patterns of the wrong class.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RegValue {
    /// 32-bit integer.
    Int(i32),
    /// 64-bit integer (pair read as one value, or INT64 op result).
    Long(i64),
    /// Double-precision float.
    Double(f64),
    /// Single-precision float.
    Float(f32),
    /// Integer-pair value.
    IntPair(i32, i32),
}

impl Default for RegValue {
    fn default() -> Self {
        Self::Int(0)
    }
}

impl RegValue {
    /// Interprets the value as a 64-bit integer, for generic ALU/address
    /// arithmetic that doesn't care about the original register class.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        match self {
            Self::Int(v) => v as i64,
            Self::Long(v) => v,
            Self::Double(v) => v as i64,
            Self::Float(v) => v as i64,
            Self::IntPair(hi, lo) => ((hi as i64) << 32) | (lo as u32 as i64),
        }
    }
}

/// The dynamic instance: a single in-flight occurrence of a static
/// instruction, addressed everywhere else by its `tag` (spec §3).
#[derive(Clone, Debug)]
pub struct Instance {
    // --- identity ---
    /// Unique per-processor tag.
    pub tag: Tag,
    /// Program counter.
    pub pc: u32,
    /// Next-PC (fall-through or predicted target at fetch time).
    pub npc: u32,
    /// The static instruction this instance executes.
    pub code: StaticInstruction,

    // --- renaming ---
    /// Logical source register 1.
    pub lrs1: Option<u8>,
    /// Logical source register 2.
    pub lrs2: Option<u8>,
    /// Logical source condition-code register (reads `%icc`).
    pub lrs_cc: bool,
    /// Logical destination register.
    pub lrd: Option<u8>,
    /// Logical destination condition-code register.
    pub lrcc: bool,
    /// Physical register holding source 1's value.
    pub prs1: Option<u32>,
    /// Physical register holding source 2's value.
    pub prs2: Option<u32>,
    /// Physical register holding the source condition code.
    pub prscc: Option<u32>,
    /// Physical destination register.
    pub prd: Option<u32>,
    /// Physical destination pair-second register (`INTPAIR`).
    pub prdp: Option<u32>,
    /// Physical destination condition-code register.
    pub prcc: Option<u32>,
    /// Physical source for RMW-half-FP destinations (read-modify-write).
    pub prsd: Option<u32>,
    /// Window-number snapshot at rename time.
    pub win_num: u32,

    // --- dependence accounting ---
    /// True-dependence flag.
    pub true_dep: bool,
    /// Address-dependence flag (address operand not yet ready).
    pub addr_dep: bool,
    /// Structural-dependence phase.
    pub struc_dep: StrucDep,
    /// Branch-dependence phase (0..=2): tracks unresolved control ancestors.
    pub branch_dep: u8,
    /// Count of mini-stall-queues this instance is currently registered in.
    pub stallqs: u32,
    /// Bitmask of outstanding source-register waits (`BUSY_SETRS1` etc.).
    pub busy_bits: u8,

    // --- operand values after issue ---
    /// Source 1 value.
    pub rs1_val: RegValue,
    /// Source 2 value.
    pub rs2_val: RegValue,
    /// Source condition-code value.
    pub rs_cc_val: i32,
    /// Destination value (result).
    pub rd_val: RegValue,
    /// Destination condition-code value.
    pub rcc_val: i32,

    // --- branch speculation ---
    /// Predicted PC, filled in at decode.
    pub branch_pred: u32,
    /// Actual new PC, filled in at completion.
    pub new_pc: u32,
    /// Whether the prediction was wrong, filled in at completion.
    pub mispredicted: bool,
    /// Whether the delay slot was annulled.
    pub annulled: bool,
    /// Return value of `StartCtlXfer` (direction taken).
    pub taken: bool,

    // --- memory ---
    /// Effective address (low end).
    pub addr: u32,
    /// Effective address (high/finish end, for doubleword accesses).
    pub finish_addr: u32,
    /// Has address generation completed?
    pub addr_ready: bool,
    /// Current memory-instruction lifecycle state.
    pub memprogress: MemProgress,
    /// Waiting on an ambiguous store under `SPEC_LIMBO`/`SPEC_EXCEPT`.
    pub limbo: bool,
    /// Marked to be killed and reissued (disambiguation violation).
    pub kill: bool,
    /// Is this a software-prefetch instance?
    pub prefetched: bool,
    /// Forwarded from the virtual store buffer (not yet written through).
    pub vsbfwd: bool,
    /// Has the memory operation been globally performed?
    pub global_perform: bool,
    /// Partial, unforwardable address overlap detected.
    pub partial_overlap: bool,
    /// Cache-completion miss classification.
    pub miss: MissType,
    /// Late-prefetch flag (demand access raced ahead of its prefetch).
    pub late_prefetch: bool,
    /// Store has been marked ready to issue (`mark_stores_ready`).
    pub store_ready: bool,
    /// Present in the memory unit's queues.
    pub in_memunit: bool,

    // --- timing ---
    /// Cycle issued to a functional unit / the cache port.
    pub issue_cycle: Option<u64>,
    /// Cycle address generation was issued (static scheduling only).
    pub addr_issue_cycle: Option<u64>,
    /// Cycle completion was scheduled for.
    pub completion_cycle: Option<u64>,
    /// Wall-clock timestamp: entered the active list.
    pub time_active_list: f64,
    /// Wall-clock timestamp: address became ready.
    pub time_addr_ready: f64,
    /// Wall-clock timestamp: issued.
    pub time_issued: f64,

    /// Current exception kind carried by this instance, if any.
    pub exception: ExceptionKind,
}

impl Instance {
    /// Creates a freshly fetched instance with no renaming or execution
    /// state populated yet.
    #[must_use]
    pub fn new(tag: Tag, pc: u32, npc: u32, code: StaticInstruction) -> Self {
        let lrs1 = code.rs1;
        let lrs2 = code.rs2;
        let lrs_cc = code.rs_cc;
        let lrd = code.rd;
        let lrcc = code.sets_cc;
        Self {
            tag,
            pc,
            npc,
            code,
            lrs1,
            lrs2,
            lrs_cc,
            lrd,
            lrcc,
            prs1: None,
            prs2: None,
            prscc: None,
            prd: None,
            prdp: None,
            prcc: None,
            prsd: None,
            win_num: 0,
            true_dep: false,
            addr_dep: false,
            struc_dep: StrucDep::Renamed,
            branch_dep: 0,
            stallqs: 0,
            busy_bits: 0,
            rs1_val: RegValue::default(),
            rs2_val: RegValue::default(),
            rs_cc_val: 0,
            rd_val: RegValue::default(),
            rcc_val: 0,
            branch_pred: 0,
            new_pc: 0,
            mispredicted: false,
            annulled: false,
            taken: false,
            addr: 0,
            finish_addr: 0,
            addr_ready: false,
            memprogress: MemProgress::Unissued,
            limbo: false,
            kill: false,
            prefetched: false,
            vsbfwd: false,
            global_perform: false,
            partial_overlap: false,
            miss: MissType::None,
            late_prefetch: false,
            store_ready: false,
            in_memunit: false,
            issue_cycle: None,
            addr_issue_cycle: None,
            completion_cycle: None,
            time_active_list: 0.0,
            time_addr_ready: 0.0,
            time_issued: 0.0,
            exception: ExceptionKind::Ok,
        }
    }

    /// True once every outstanding source-register wait has been cleared.
    #[must_use]
    pub const fn sources_ready(&self) -> bool {
        self.busy_bits == 0
    }
}
