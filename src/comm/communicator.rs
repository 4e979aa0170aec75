//! Communication abstraction for serial, intra-process (threaded), and
//! inter-process (MPI) message passing.
//!
//! Wire conventions for the protocols built on top:
//! - all integers are little-endian fixed width (i32 counts and ids);
//! - payload records are `#[repr(C)]` and `bytemuck::Pod`-safe;
//! - receivers may truncate to their provided buffer length, so protocols
//!   that need exact lengths exchange sizes first.

use once_cell::sync::Lazy;
use std::collections::{HashMap, VecDeque};
use std::sync::{Condvar, Mutex};

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

/// Non-blocking communication interface.
///
/// Implementors provide asynchronous send/receive and waitable handles;
/// the distribution, halo-exchange, and gather protocols are written
/// against this trait only.
pub trait Communicator: Send + Sync + 'static {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    /// Post an asynchronous send of `buf` to `peer`.
    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post an asynchronous receive from `peer`; `buf` only conveys the
    /// expected length, delivery happens through the returned handle.
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// Rank of this process (0..size-1).
    fn rank(&self) -> usize;
    /// Total number of ranks.
    fn size(&self) -> usize;

    /// Synchronization barrier (default: no-op for local backends).
    fn barrier(&self) {}

    /// Tear down the whole computation. Local backends exit the process;
    /// the MPI backend aborts the communicator so remote ranks do not
    /// hang in their collectives.
    fn abort(&self, code: i32) -> ! {
        std::process::exit(code)
    }
}

/// Tag newtype for safer tag arithmetic.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct CommTag(pub u16);

impl CommTag {
    /// Create a new tag from a raw `u16`.
    #[inline]
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }

    /// Return the underlying `u16` value.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Safely offset the tag by `dx`, wrapping on overflow.
    #[inline]
    pub const fn offset(self, dx: u16) -> Self {
        Self(self.0.wrapping_add(dx))
    }
}

impl From<u16> for CommTag {
    #[inline]
    fn from(x: u16) -> Self {
        CommTag::new(x)
    }
}

/// Tag bundle for the three-stage setup distribution, with deterministic
/// per-phase offsets from a single base.
#[derive(Copy, Clone, Debug)]
pub struct SetupTags {
    /// Block-structure stream (sizes and payloads share the stream).
    pub blocks: CommTag,
    /// Request-count gather during the initial-state stage.
    pub req_counts: CommTag,
    /// Requested-id gatherv during the initial-state stage.
    pub req_ids: CommTag,
    /// Per-row value count broadcast.
    pub row_width: CommTag,
    /// Initial-state payload scatterv.
    pub state: CommTag,
    /// Block-adjacency map broadcast.
    pub adjacency: CommTag,
    /// Block-owner map broadcast.
    pub owners: CommTag,
    /// Result-size gather and result gatherv.
    pub results: CommTag,
}

impl SetupTags {
    /// Construct tags from a base, assigning deterministic offsets per phase.
    pub const fn from_base(base: CommTag) -> Self {
        Self {
            blocks: base,
            req_counts: base.offset(1),
            req_ids: base.offset(2),
            row_width: base.offset(3),
            state: base.offset(4),
            adjacency: base.offset(5),
            owners: base.offset(6),
            results: base.offset(7),
        }
    }
}

/// Number of distinct halo tags cycled across steps. FIFO ordering per
/// `(peer, tag)` pair already prevents cross-step mixups; the cycle keeps
/// a late step-k message from ever matching step k+1's receives.
pub const HALO_TAG_CYCLE: u64 = 1024;

/// Per-step halo tag: `base` offset by `step mod HALO_TAG_CYCLE`.
#[inline]
pub const fn halo_tag(base: CommTag, step: u64) -> CommTag {
    base.offset((step % HALO_TAG_CYCLE) as u16)
}

/// Compile-time no-op comm for pure serial runs and unit tests.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}

    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}

    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }
}

// --- ThreadComm: intra-process, one thread per rank ---

/// Delivery route of a message: `(source rank, destination rank, tag)`.
type Route = (usize, usize, u16);

/// In-flight messages for every route in the process, behind a single
/// lock with a single condvar. A sender posts under the lock and wakes
/// every waiting receiver; each receiver re-checks only its own route.
/// One shared primitive is coarser than per-route signalling, but the
/// fan-in per rank is a handful of peers and the store can never deadlock
/// or leak wakeups. Queues are removed once drained so the route map does
/// not grow with the tag space.
struct PostOffice {
    routes: Mutex<HashMap<Route, VecDeque<Vec<u8>>>>,
    arrived: Condvar,
}

impl PostOffice {
    fn deliver(&self, route: Route, message: Vec<u8>) {
        self.routes
            .lock()
            .expect("post office poisoned")
            .entry(route)
            .or_default()
            .push_back(message);
        self.arrived.notify_all();
    }

    fn take(&self, route: Route) -> Vec<u8> {
        let mut routes = self.routes.lock().expect("post office poisoned");
        loop {
            let next = routes.get_mut(&route).and_then(|q| q.pop_front());
            if let Some(message) = next {
                if routes.get(&route).is_some_and(|q| q.is_empty()) {
                    routes.remove(&route);
                }
                return message;
            }
            routes = self
                .arrived
                .wait(routes)
                .expect("post office poisoned");
        }
    }
}

static POST_OFFICE: Lazy<PostOffice> = Lazy::new(|| PostOffice {
    routes: Mutex::new(HashMap::new()),
    arrived: Condvar::new(),
});

/// Delivery happened at `isend` time; there is nothing left to wait on.
pub struct ThreadSendHandle;

impl Wait for ThreadSendHandle {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Pulls the next message for its route, blocking until one is posted.
pub struct ThreadRecvHandle {
    route: Route,
    capacity: usize,
}

impl Wait for ThreadRecvHandle {
    fn wait(self) -> Option<Vec<u8>> {
        let mut message = POST_OFFICE.take(self.route);
        message.truncate(self.capacity.min(message.len()));
        Some(message)
    }
}

/// Intra-process communicator: each simulated rank is a thread, and all
/// messages pass through the process-global [`PostOffice`] keyed by
/// `(src, dst, tag)`. Concurrent test worlds in one process must use
/// distinct base tags.
#[derive(Clone, Debug)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
}

impl ThreadComm {
    /// Communicator for `rank` in a pool of `size` thread-ranks.
    pub fn new(rank: usize, size: usize) -> Self {
        Self { rank, size }
    }
}

impl Communicator for ThreadComm {
    type SendHandle = ThreadSendHandle;
    type RecvHandle = ThreadRecvHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        POST_OFFICE.deliver((self.rank, peer, tag), buf.to_vec());
        ThreadSendHandle
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle {
        ThreadRecvHandle {
            route: (peer, self.rank, tag),
            capacity: buf.len(),
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }
}

// --- MPI backend ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Communicator, Wait};
    use mpi::collective::CommunicatorCollectives;
    use mpi::environment::Universe;
    use mpi::point_to_point::{Destination, Source};
    use mpi::request::{Request, StaticScope};
    use mpi::topology::{Communicator as _, SimpleCommunicator};

    /// Transfer buffer handed to MPI for the duration of a request.
    ///
    /// The `mpi` crate scopes a request's lifetime to its buffer, so a
    /// handle that outlives the posting call needs `'static` storage: the
    /// buffer is moved onto the heap and deliberately not freed until the
    /// request has completed. `settle` is the only way to get the bytes
    /// back, and calling it before completion is why both viewer methods
    /// and `settle` are `unsafe`.
    struct Lease {
        raw: *mut [u8],
    }

    impl Lease {
        fn holding(payload: Vec<u8>) -> Self {
            Self {
                raw: Box::into_raw(payload.into_boxed_slice()),
            }
        }

        fn zeroed(len: usize) -> Self {
            Self::holding(vec![0u8; len])
        }

        /// Shared `'static` view for posting a send.
        ///
        /// # Safety
        /// The lease must outlive the request reading from this view.
        unsafe fn send_view(&self) -> &'static [u8] {
            unsafe { &*self.raw }
        }

        /// Exclusive `'static` view for posting a receive.
        ///
        /// # Safety
        /// The lease must outlive the request writing into this view, and
        /// no other view of it may exist.
        unsafe fn recv_view(&self) -> &'static mut [u8] {
            unsafe { &mut *self.raw }
        }

        /// Reclaim the buffer.
        ///
        /// # Safety
        /// The request this lease was posted with must have completed.
        unsafe fn settle(self) -> Vec<u8> {
            Vec::from(unsafe { Box::from_raw(self.raw) })
        }
    }

    // Raw pointer member; the lease itself is only moved between the
    // posting call and the owning handle.
    unsafe impl Send for Lease {}

    type ByteRequest = Request<'static, [u8], StaticScope>;

    /// Drive an optional pending request to completion and settle its
    /// lease. Idempotent: both `wait` and `Drop` funnel through here, so
    /// a handle is reclaimed exactly once. Unwaited handles block in
    /// `Drop` instead of freeing storage MPI may still be using; the
    /// protocols always wait explicitly, so that path only runs during
    /// error unwinding.
    fn settle_pending(req: &mut Option<ByteRequest>, lease: &mut Option<Lease>) -> Option<Vec<u8>> {
        if let Some(req) = req.take() {
            let _ = req.wait();
        }
        lease.take().map(|l| unsafe { l.settle() })
    }

    /// MPI-world communicator; owns the universe for the process lifetime.
    pub struct MpiComm {
        _universe: Universe,
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    // One engine per rank and the world handle is never used from two
    // threads at once; the bounds come from the Communicator trait.
    unsafe impl Send for MpiComm {}
    unsafe impl Sync for MpiComm {}

    impl Default for MpiComm {
        fn default() -> Self {
            let universe = mpi::initialize().expect("MPI initialization failed");
            let world = universe.world();
            let (rank, size) = (world.rank() as usize, world.size() as usize);
            Self {
                _universe: universe,
                world,
                rank,
                size,
            }
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiSendHandle;
        type RecvHandle = MpiRecvHandle;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
            let lease = Lease::holding(buf.to_vec());
            let req = self.world.process_at_rank(peer as i32).immediate_send_with_tag(
                StaticScope,
                unsafe { lease.send_view() },
                tag as i32,
            );
            MpiSendHandle {
                req: Some(req),
                lease: Some(lease),
            }
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle {
            let expected = buf.len();
            let lease = Lease::zeroed(expected);
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_receive_into_with_tag(
                    StaticScope,
                    unsafe { lease.recv_view() },
                    tag as i32,
                );
            MpiRecvHandle {
                req: Some(req),
                lease: Some(lease),
                expected,
            }
        }

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn barrier(&self) {
            self.world.barrier();
        }

        fn abort(&self, code: i32) -> ! {
            self.world.abort(code)
        }
    }

    /// Pending nonblocking send; completion discards the leased copy.
    pub struct MpiSendHandle {
        req: Option<ByteRequest>,
        lease: Option<Lease>,
    }

    impl Wait for MpiSendHandle {
        fn wait(mut self) -> Option<Vec<u8>> {
            settle_pending(&mut self.req, &mut self.lease);
            None
        }
    }

    impl Drop for MpiSendHandle {
        fn drop(&mut self) {
            settle_pending(&mut self.req, &mut self.lease);
        }
    }

    /// Pending nonblocking receive; completion yields the leased buffer
    /// truncated to the posted length.
    pub struct MpiRecvHandle {
        req: Option<ByteRequest>,
        lease: Option<Lease>,
        expected: usize,
    }

    impl Wait for MpiRecvHandle {
        fn wait(mut self) -> Option<Vec<u8>> {
            let mut data = settle_pending(&mut self.req, &mut self.lease)?;
            data.truncate(self.expected);
            Some(data)
        }
    }

    impl Drop for MpiRecvHandle {
        fn drop(&mut self) {
            settle_pending(&mut self.req, &mut self.lease);
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_offsets_wrap() {
        let t = CommTag::new(u16::MAX);
        assert_eq!(t.offset(1).as_u16(), 0);
    }

    #[test]
    fn halo_tags_cycle() {
        let base = CommTag::new(0x4000);
        assert_eq!(halo_tag(base, 0), base);
        assert_eq!(halo_tag(base, HALO_TAG_CYCLE), base);
        assert_ne!(halo_tag(base, 1), halo_tag(base, 2));
    }

    #[test]
    fn setup_tags_are_distinct() {
        let t = SetupTags::from_base(CommTag::new(0x2000));
        let all = [
            t.blocks, t.req_counts, t.req_ids, t.row_width, t.state, t.adjacency, t.owners,
            t.results,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
