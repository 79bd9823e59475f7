//!
//! @file hook.rs
//! @author Gothic Free Aim Developers
//! @brief Redirects game code into handlers, preserving the register state of the game.
//! @bug No known bugs.
//!
//! Each hook overwrites at least five bytes of game code with a jump to a stub in a code arena.
//! The stub saves every register, calls a single dispatcher with the hook index and a pointer to
//! the saved registers, restores the (possibly modified) registers, and then jumps through a
//! slot which the dispatcher filled in with the resume address chosen by the handler.
//!
//! Arena layout of a hook:
//!
//! ```text
//! [slot: u32][stub][skip tail][trampoline]
//! ```
//!
//! The trampoline re-executes the overwritten instructions and jumps back behind them, so a
//! handler which returns Flow::Continue leaves the game behaving as if it had never been hooked.
//! The skip tail pops the arguments of a callee-clean call and jumps behind the overwritten
//! instructions, which is how a replacement handler stands in for a call.
//!
//! The overwritten instructions are copied, not decoded. Each site declares its exact length and
//! the offsets of any rel32 operands within it, which are the only things we relocate.
//!

use std::mem::size_of;

use crate::asm::{self, Assembly, Encoding, Register};
use crate::errors::{PatchError, PatchResult};
use crate::memory::{Memory, BRANCH_SIZE};
use crate::patch::{check_overlaps, Claim};
use crate::sig::{BinarySig, Signature};
use crate::table::AddressTable;

/// The size of the register saving stub, which is the same for every hook.
const STUB_SIZE: usize = 24;

///
/// The register state of the game at a hook site, as laid out on the stack by pushfd; pushad.
///
/// Handlers may modify any field but esp. The stub restores everything else when the handler
/// returns.
///
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CallContext {
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub esp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub eflags: u32
}

/// Where the game resumes after a handler returns.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Flow {
    /// Run the overwritten instructions, then continue behind them.
    Continue,

    /// Pop the sites stack cleanup, then continue behind the overwritten instructions.
    Skip
}

/// Describes where and how a hook is installed.
#[derive(Copy, Clone, Debug)]
pub struct HookSite {
    pub name: &'static str,
    pub symbol: &'static str,
    pub original: Signature,
    pub relocations: &'static [usize],
    pub stack_cleanup: u8
}

/// Everything a handler may touch while the game is stopped at its hook.
pub struct HookCall<'a, T> {
    pub state: &'a mut T,
    pub mem: &'a mut dyn Memory,
    pub ctx: &'a mut CallContext
}

/// A hook handler.
pub type Handler<T> = fn(&mut HookCall<'_, T>) -> Flow;

/// A fixed region of executable memory which hook stubs are bump allocated from.
#[derive(Debug)]
pub struct CodeArena {
    base: usize,
    size: usize,
    used: usize
}

/// An installed hook.
pub struct Hook<T> {
    name: &'static str,
    addr: usize,
    len: usize,
    slot: usize,
    stub: usize,
    skip: usize,
    trampoline: usize,
    redirect: Assembly,
    handler: Handler<T>
}

/// Owns every installed hook, and dispatches calls to their handlers.
pub struct HookEngine<T> {
    hooks: Vec<Hook<T>>
}

impl CallContext {
    /// Gets the value esp held at the hook site, before the stub pushed anything.
    pub fn stack_ptr(
        &self
    ) -> usize {
        // pushad stores esp after pushfd has already pushed.
        self.esp as usize + size_of::<u32>()
    }

    /// Reads the nth dword on the stack at the hook site.
    pub fn arg(
        &self,
        mem: &dyn Memory,
        n: usize
    ) -> u32 {
        mem.read_u32(self.stack_ptr() + n * size_of::<u32>())
    }

    /// Overwrites the nth dword on the stack at the hook site.
    pub fn set_arg(
        &self,
        mem: &mut dyn Memory,
        n: usize,
        value: u32
    ) {
        mem.write_u32(self.stack_ptr() + n * size_of::<u32>(), value);
    }

    /// Reads the nth dword on the stack at the hook site as a float.
    pub fn arg_f32(
        &self,
        mem: &dyn Memory,
        n: usize
    ) -> f32 {
        f32::from_bits(self.arg(mem, n))
    }

    /// Overwrites the nth dword on the stack at the hook site with a float.
    pub fn set_arg_f32(
        &self,
        mem: &mut dyn Memory,
        n: usize,
        value: f32
    ) {
        self.set_arg(mem, n, value.to_bits());
    }

    /// Gets the object pointer of a thiscall.
    pub fn this_ptr(
        &self
    ) -> usize {
        self.ecx as usize
    }

    /// Sets the value the game will see in eax.
    pub fn set_return(
        &mut self,
        value: u32
    ) {
        self.eax = value;
    }
}

impl CodeArena {
    ///
    /// Creates an arena over the given region.
    ///
    /// The region must be executable and writable for as long as any hook exists.
    ///
    pub const fn new(
        base: usize,
        size: usize
    ) -> Self {
        Self { base, size, used: 0 }
    }

    /// Reserves len bytes, returning their address.
    pub fn reserve(
        &mut self,
        len: usize
    ) -> PatchResult<usize> {
        let left = self.size - self.used;
        if len > left {
            return Err(PatchError::ArenaExhausted { needed: len, left });
        }

        let ret = self.base + self.used;
        self.used += len;
        Ok(ret)
    }

    /// Gets the number of bytes handed out so far.
    pub fn used(
        &self
    ) -> usize {
        self.used
    }
}

impl<T> Hook<T> {
    /// Gets the name of the hook.
    pub fn name(&self) -> &'static str { self.name }

    /// Gets the address of the register saving stub.
    pub fn stub(&self) -> usize { self.stub }

    /// Gets the address of the slot the stub jumps through.
    pub fn slot(&self) -> usize { self.slot }

    /// Gets the address Flow::Continue resumes at.
    pub fn trampoline(&self) -> usize { self.trampoline }

    /// Gets the address Flow::Skip resumes at.
    pub fn skip(&self) -> usize { self.skip }

    /// Gets the game bytes owned by the hook.
    pub fn claim(
        &self
    ) -> Claim {
        Claim { start: self.addr, len: self.len, owner: self.name }
    }
}

impl<T> HookEngine<T> {
    /// Creates an engine with no hooks.
    pub const fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    ///
    /// Installs a hook at the given site, returning its index.
    ///
    /// The dispatcher is the address of a function which, given the index and the saved
    /// registers, ends up calling dispatch() on this engine. Everything in the arena is written
    /// before the game code is touched, and the game code is then redirected with one write, so
    /// the game never executes a half-built hook. If anything fails, the game is not written.
    ///
    pub fn install(
        &mut self,
        mem: &mut dyn Memory,
        arena: &mut CodeArena,
        dispatcher: usize,
        site: &HookSite,
        table: &AddressTable,
        handler: Handler<T>
    ) -> PatchResult<u32> {
        let addr = table.resolve(site.symbol)?;
        let len = site.original.len();
        if len < asm::MIN_HOOK_SIZE
            || site.relocations.iter().any(|r| *r + size_of::<i32>() > len)
            || site.stack_cleanup > i8::MAX as u8 {
            return Err(PatchError::LengthMismatch(site.name));
        }

        if let Err(found) = site.original.check(mem, addr) {
            log::error!("[FAILURE] Hook {} does not match the game code!", site.name);
            log::error!("\\------> [EXPECTED] {}", site.original);
            log::error!(" \\-----> [FOUND...] {}", found);
            return Err(PatchError::SignatureMismatch { name: site.name, addr });
        }

        let mut claims: Vec<Claim> = self.hooks.iter().map(|h| h.claim()).collect();
        claims.push(Claim { start: addr, len, owner: site.name });
        check_overlaps(claims)?;

        let index = self.hooks.len() as u32;
        let tail = (if site.stack_cleanup > 0 { 4 } else { 0 }) + BRANCH_SIZE;
        let base = arena.reserve(size_of::<u32>() + STUB_SIZE + tail + len + BRANCH_SIZE)?;
        let slot = base;
        let stub = slot + size_of::<u32>();
        let skip = stub + STUB_SIZE;
        let trampoline = skip + tail;

        let mut code = BinarySig::read(mem, addr, len).0;
        for r in site.relocations.iter() {
            asm::relocate(&mut code, *r, addr, trampoline)?;
        }

        let tramp_asm = Assembly::new(trampoline, &[
            Encoding::Verbatim(&code),
            Encoding::JumpRelative, Encoding::RelativeD(addr + len)
        ])?;

        let skip_asm = if site.stack_cleanup > 0 {
            Assembly::new(skip, &[
                Encoding::LeaEspDispSH, Encoding::AbsoluteSH(site.stack_cleanup as i8),
                Encoding::JumpRelative, Encoding::RelativeD(addr + len)
            ])
        } else {
            Assembly::new(skip, &[Encoding::JumpRelative, Encoding::RelativeD(addr + len)])
        }?;

        let stub_asm = Assembly::new(stub, &[
            Encoding::PushFlags,
            Encoding::PushAll,
            Encoding::Push(Register::Esp),
            Encoding::PushImmD, Encoding::AbsoluteD(index),
            Encoding::CallRelative, Encoding::RelativeD(dispatcher),
            Encoding::AddEspImmSH, Encoding::AbsoluteSH(8),
            Encoding::PopAll,
            Encoding::PopFlags,
            Encoding::JumpIndirect, Encoding::AbsoluteD(slot as u32)
        ])?;
        debug_assert_eq!(stub_asm.len(), STUB_SIZE);

        let redirect = Assembly::jump(addr, stub, len)?;

        tramp_asm.apply(mem);
        skip_asm.apply(mem);
        stub_asm.apply(mem);
        mem.write_u32(slot, trampoline as u32);
        redirect.apply(mem);

        log::info!(
            "[SUCCESS] Hook {} [{:#010x}; {}] -> stub {:#010x}, trampoline {:#010x}",
            site.name,
            addr,
            len,
            stub,
            trampoline
        );

        self.hooks.push(Hook {
            name: site.name,
            addr,
            len,
            slot,
            stub,
            skip,
            trampoline,
            redirect,
            handler
        });

        Ok(index)
    }

    ///
    /// Runs the handler of the given hook, then points its slot at the resume address the
    /// handler chose. Returns that address.
    ///
    /// A slot holds the trampoline until the first dispatch, and the last resume address after
    /// it. An unknown index leaves every slot alone.
    ///
    pub fn dispatch(
        &self,
        index: u32,
        state: &mut T,
        mem: &mut dyn Memory,
        ctx: &mut CallContext
    ) -> PatchResult<usize> {
        let hook = self.hooks.get(index as usize).ok_or(PatchError::UnknownHook(index))?;

        let flow = (hook.handler)(&mut HookCall { state, mem: &mut *mem, ctx });
        let resume = match flow {
            Flow::Continue => hook.trampoline,
            Flow::Skip => hook.skip
        };

        mem.write_u32(hook.slot, resume as u32);
        Ok(resume)
    }

    /// Checks that every hook site still holds its redirect. Returns the number of failures.
    pub fn verify(
        &self,
        mem: &dyn Memory
    ) -> usize {
        let mut fails = 0;
        for h in self.hooks.iter() {
            if !h.redirect.verify(mem) {
                log::error!("[ERROR] Hook {} has been clobbered!", h.name);
                fails += 1;
            }
        }
        fails
    }

    /// Finds the installed hook with the given name.
    pub fn get(
        &self,
        name: &str
    ) -> Option<&Hook<T>> {
        self.hooks.iter().find(|h| h.name == name)
    }

    /// Gets the trampoline of the named hook.
    pub fn trampoline_of(
        &self,
        name: &str
    ) -> Option<usize> {
        self.get(name).map(|h| h.trampoline)
    }

    /// Gets the skip tail of the named hook.
    pub fn skip_of(
        &self,
        name: &str
    ) -> Option<usize> {
        self.get(name).map(|h| h.skip)
    }

    /// Gets the game bytes owned by every hook.
    pub fn claims(
        &self
    ) -> impl Iterator<Item = Claim> + '_ {
        self.hooks.iter().map(|h| h.claim())
    }

    /// Gets the number of installed hooks.
    pub fn len(
        &self
    ) -> usize {
        self.hooks.len()
    }

    /// Checks if no hook is installed.
    pub fn is_empty(
        &self
    ) -> bool {
        self.hooks.is_empty()
    }
}

impl<T> Default for HookEngine<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockMemory;
    use crate::table::{code, AddressEntry};
    use gothic_common::GameVersion;

    const FUNC: usize = 0x0050_0000;
    const CALL: usize = 0x0050_1000;
    const CALLEE: usize = 0x0058_0000;
    const ARENA: usize = 0x0100_0000;
    const DISPATCHER: usize = 0x0200_0000;

    static ENTRIES: [AddressEntry; 2] = [
        code("oCGame__Render", FUNC),
        code("oCNpc__GetNearestValidNpc_call", CALL)
    ];
    static TABLE: AddressTable = AddressTable::new(GameVersion::Gothic1, &ENTRIES);

    // push -1; push imm32
    static PROLOGUE: HookSite = HookSite {
        name: "frame",
        symbol: "oCGame__Render",
        original: crate::signature![0x6a, 0xff, 0x68, ?, ?, ?, ?; 7],
        relocations: &[],
        stack_cleanup: 0
    };

    // call rel32, callee cleans one dword.
    static CALL_SITE: HookSite = HookSite {
        name: "auto_target",
        symbol: "oCNpc__GetNearestValidNpc_call",
        original: crate::signature![0xe8, ?, ?, ?, ?; 5],
        relocations: &[1],
        stack_cleanup: 4
    };

    #[derive(Default)]
    struct Calls {
        seen: Vec<u32>,
        skip: bool
    }

    fn record(
        call: &mut HookCall<'_, Calls>
    ) -> Flow {
        call.state.seen.push(call.ctx.ecx);
        if call.state.skip {
            call.ctx.set_return(0);
            Flow::Skip
        } else {
            Flow::Continue
        }
    }

    fn game() -> MockMemory {
        let mut mem = MockMemory::new();
        mem.load(FUNC, &[0x6a, 0xff, 0x68, 0x78, 0x56, 0x34, 0x12, 0x64, 0xa1]);
        mem.load(CALL, &[0xe8, 0, 0, 0, 0, 0x85, 0xc0]);
        mem.write_call_target(CALL, CALLEE);
        mem.clear_log();
        mem
    }

    #[test]
    fn install_writes_the_redirect_last() {
        let mut mem = game();
        let mut arena = CodeArena::new(ARENA, 0x100);
        let mut engine = HookEngine::<Calls>::new();
        engine.install(&mut mem, &mut arena, DISPATCHER, &PROLOGUE, &TABLE, record).unwrap();

        let log = mem.write_log();
        let (last_addr, last) = log.last().unwrap();
        assert_eq!(*last_addr, FUNC);
        assert_eq!(last.len(), 7);
        assert_eq!(last[0], 0xe9);
        assert_eq!(&last[5..], &[0x90, 0x90]);
        assert_eq!(mem.read_call_target(FUNC), engine.get("frame").unwrap().stub());
        assert!(log[..log.len() - 1].iter().all(|(a, _)| *a >= ARENA));
        assert_eq!(engine.verify(&mem), 0);
    }

    #[test]
    fn trampoline_replays_the_original_code() {
        let mut mem = game();
        let mut arena = CodeArena::new(ARENA, 0x100);
        let mut engine = HookEngine::<Calls>::new();
        engine.install(&mut mem, &mut arena, DISPATCHER, &PROLOGUE, &TABLE, record).unwrap();

        let tramp = engine.trampoline_of("frame").unwrap();
        assert_eq!(mem.snapshot(tramp, 7), vec![0x6a, 0xff, 0x68, 0x78, 0x56, 0x34, 0x12]);
        assert_eq!(mem.read_u8(tramp + 7), 0xe9);
        assert_eq!(mem.read_call_target(tramp + 7), FUNC + 7);

        // The slot starts out at the trampoline, so a hook with no handler run is a no-op.
        let hook = engine.get("frame").unwrap();
        assert_eq!(mem.read_u32(hook.slot()) as usize, tramp);
    }

    #[test]
    fn stub_saves_and_restores_every_register() {
        let mut mem = game();
        let mut arena = CodeArena::new(ARENA, 0x100);
        let mut engine = HookEngine::<Calls>::new();
        engine.install(&mut mem, &mut arena, DISPATCHER, &PROLOGUE, &TABLE, record).unwrap();

        let hook = engine.get("frame").unwrap();
        let stub = mem.snapshot(hook.stub(), STUB_SIZE);
        assert_eq!(&stub[..4], &[0x9c, 0x60, 0x54, 0x68]);
        assert_eq!(&stub[4..8], &0u32.to_le_bytes());
        assert_eq!(stub[8], 0xe8);
        assert_eq!(mem.read_call_target(hook.stub() + 8), DISPATCHER);
        assert_eq!(&stub[13..18], &[0x83, 0xc4, 0x08, 0x61, 0x9d]);
        assert_eq!(&stub[18..20], &[0xff, 0x25]);
        assert_eq!(mem.read_u32(hook.stub() + 20) as usize, hook.slot());
    }

    #[test]
    fn continue_resumes_at_the_trampoline() {
        let mut mem = game();
        let mut arena = CodeArena::new(ARENA, 0x100);
        let mut engine = HookEngine::<Calls>::new();
        let index = engine.install(&mut mem, &mut arena, DISPATCHER, &PROLOGUE, &TABLE, record)
            .unwrap();

        let mut state = Calls::default();
        let mut ctx = CallContext { ecx: 0xabcd, ..Default::default() };
        let before = ctx;
        let resume = engine.dispatch(index, &mut state, &mut mem, &mut ctx).unwrap();

        assert_eq!(resume, engine.trampoline_of("frame").unwrap());
        assert_eq!(state.seen, vec![0xabcd]);
        assert_eq!(ctx, before);
    }

    #[test]
    fn replaced_calls_relocate_and_skip() {
        let mut mem = game();
        let mut arena = CodeArena::new(ARENA, 0x100);
        let mut engine = HookEngine::<Calls>::new();
        let index = engine.install(&mut mem, &mut arena, DISPATCHER, &CALL_SITE, &TABLE, record)
            .unwrap();

        let tramp = engine.trampoline_of("auto_target").unwrap();
        assert_eq!(mem.read_call_target(tramp), CALLEE);

        let skip = engine.skip_of("auto_target").unwrap();
        assert_eq!(mem.snapshot(skip, 4), vec![0x8d, 0x64, 0x24, 0x04]);
        assert_eq!(mem.read_call_target(skip + 4), CALL + 5);

        let mut state = Calls { skip: true, ..Default::default() };
        let mut ctx = CallContext { eax: 0x1234, ..Default::default() };
        let resume = engine.dispatch(index, &mut state, &mut mem, &mut ctx).unwrap();
        assert_eq!(resume, skip);
        assert_eq!(ctx.eax, 0);
        assert_eq!(mem.read_u32(engine.get("auto_target").unwrap().slot()) as usize, skip);
    }

    #[test]
    fn slot_holds_the_last_resume_address() {
        let mut mem = game();
        let mut arena = CodeArena::new(ARENA, 0x100);
        let mut engine = HookEngine::<Calls>::new();
        let index = engine.install(&mut mem, &mut arena, DISPATCHER, &CALL_SITE, &TABLE, record)
            .unwrap();
        let slot = engine.get("auto_target").unwrap().slot();
        let tramp = engine.trampoline_of("auto_target").unwrap();
        let skip = engine.skip_of("auto_target").unwrap();
        assert_eq!(mem.read_u32(slot) as usize, tramp);

        let mut state = Calls { skip: true, ..Default::default() };
        let mut ctx = CallContext::default();
        engine.dispatch(index, &mut state, &mut mem, &mut ctx).unwrap();
        assert_eq!(mem.read_u32(slot) as usize, skip);

        // Nothing resets it between calls; the next dispatch does.
        assert_eq!(engine.dispatch(9, &mut state, &mut mem, &mut ctx), Err(PatchError::UnknownHook(9)));
        assert_eq!(mem.read_u32(slot) as usize, skip);

        state.skip = false;
        engine.dispatch(index, &mut state, &mut mem, &mut ctx).unwrap();
        assert_eq!(mem.read_u32(slot) as usize, tramp);
    }

    #[test]
    fn signature_mismatch_installs_nothing() {
        let mut mem = game();
        mem.load(FUNC, &[0x55, 0x8b, 0xec]);
        mem.clear_log();
        let mut arena = CodeArena::new(ARENA, 0x100);
        let mut engine = HookEngine::<Calls>::new();

        assert_eq!(
            engine.install(&mut mem, &mut arena, DISPATCHER, &PROLOGUE, &TABLE, record).err(),
            Some(PatchError::SignatureMismatch { name: "frame", addr: FUNC })
        );
        assert_eq!(mem.writes(), 0);
        assert_eq!(arena.used(), 0);
        assert!(engine.is_empty());
    }

    #[test]
    fn exhausted_arena_installs_nothing() {
        let mut mem = game();
        let mut arena = CodeArena::new(ARENA, 16);
        let mut engine = HookEngine::<Calls>::new();
        assert!(matches!(
            engine.install(&mut mem, &mut arena, DISPATCHER, &PROLOGUE, &TABLE, record),
            Err(PatchError::ArenaExhausted { left: 16, .. })
        ));
        assert_eq!(mem.writes(), 0);
    }

    #[test]
    fn unknown_index_leaves_slots_alone() {
        let mut mem = game();
        let mut arena = CodeArena::new(ARENA, 0x100);
        let mut engine = HookEngine::<Calls>::new();
        engine.install(&mut mem, &mut arena, DISPATCHER, &PROLOGUE, &TABLE, record).unwrap();
        mem.clear_log();

        let mut state = Calls::default();
        let mut ctx = CallContext::default();
        assert_eq!(
            engine.dispatch(7, &mut state, &mut mem, &mut ctx),
            Err(PatchError::UnknownHook(7))
        );
        assert_eq!(mem.writes(), 0);
        assert!(state.seen.is_empty());
    }

    #[test]
    fn context_reads_stack_arguments() {
        let mut mem = MockMemory::new();
        // esp as stored by pushad is four below the sites esp.
        let ctx = CallContext { esp: 0x7000 - 4, ecx: 0x55, ..Default::default() };
        mem.write_f32(0x7000, 2.5);
        mem.write_u32(0x7004, 9);

        assert_eq!(ctx.stack_ptr(), 0x7000);
        assert_eq!(ctx.arg_f32(&mem, 0), 2.5);
        assert_eq!(ctx.arg(&mem, 1), 9);
        ctx.set_arg_f32(&mut mem, 0, -1.0);
        assert_eq!(mem.read_f32(0x7000), -1.0);
        assert_eq!(ctx.this_ptr(), 0x55);
    }
}
