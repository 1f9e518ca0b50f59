//! The arena-backed context: tensor storage, the process-wide context pool,
//! and the public tensor constructors (§4.1/§6).
//!
//! Grounded on the teacher's `device/context.rs` `Arc<Inner>` + pooled-slot
//! pattern, with the GPU adapter pool swapped for [`arena::Arena`] byte
//! storage and the teacher's `RwLock`-guarded device table swapped for a
//! plain `spin::Mutex` per `DESIGN.md`'s Open Question resolution (this
//! lock only ever guards init/free/table bookkeeping, never the hot compute
//! path the busy-wait barrier owns).

pub(crate) mod arena;

use std::ops::Range;
use std::sync::Arc;

use spin::Mutex;

use crate::dtype::DType;
use crate::error::{ContextError, Error, TensorError};
use crate::ops::OpKind;
use crate::tensor::{MAX_DIMS, Tensor, TensorHeader, TensorId, shape};

/// Upper bound on simultaneously-live [`Context`]s in this process.
pub const MAX_CONTEXTS: usize = 64;

static SLOTS: Mutex<[bool; MAX_CONTEXTS]> = Mutex::new([false; MAX_CONTEXTS]);

fn acquire_slot() -> Result<u32, ContextError> {
    let mut slots = SLOTS.lock();
    match slots.iter().position(|used| !used) {
        #[allow(clippy::cast_possible_truncation)]
        Some(i) => {
            slots[i] = true;
            Ok(i as u32)
        }
        None => Err(ContextError::NoFreeContext),
    }
}

fn release_slot(id: u32) {
    SLOTS.lock()[id as usize] = false;
}

struct State {
    arena: arena::Arena,
    headers: Vec<TensorHeader>,
}

struct Inner {
    id: u32,
    state: Mutex<State>,
}

/// An arena-backed tensor store: every [`Tensor`] handle is `(Context, TensorId)`.
///
/// Cloning a `Context` bumps an `Arc` refcount; the underlying arena and
/// header table are shared, not copied. The last clone to drop releases the
/// context's slot back to the process-wide pool.
#[derive(Clone)]
pub struct Context(Arc<Inner>);

impl Context {
    /// Acquires a context slot and allocates a `mem_size`-byte arena.
    ///
    /// # Panics
    ///
    /// Panics if no context slot is free. Use [`Context::try_init`] to
    /// handle that case without panicking.
    #[must_use]
    pub fn init(mem_size: usize) -> Self {
        Self::try_init(mem_size).expect("no free context slots")
    }

    /// Fallible form of [`Context::init`].
    ///
    /// # Errors
    ///
    /// [`ContextError::NoFreeContext`] if all [`MAX_CONTEXTS`] slots are in use.
    pub fn try_init(mem_size: usize) -> Result<Self, Error> {
        let id = acquire_slot()?;
        log::trace!("context {id} init: {mem_size} bytes");
        Ok(Self(Arc::new(Inner {
            id,
            state: Mutex::new(State {
                arena: arena::Arena::new(mem_size),
                headers: Vec::new(),
            }),
        })))
    }

    /// This context's slot id in the process-wide pool.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.0.id
    }

    /// Bytes bump-allocated so far.
    #[must_use]
    pub fn used_mem(&self) -> usize {
        self.0.state.lock().arena.used()
    }

    /// Total arena capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.0.state.lock().arena.capacity()
    }

    fn check_owner(&self, id: TensorId) -> Result<(), Error> {
        if id.ctx_id != self.0.id {
            return Err(TensorError::InvalidContext {
                owner: id.ctx_id,
                used: self.0.id,
            }
            .into());
        }
        Ok(())
    }

    pub(crate) fn header(&self, id: TensorId) -> TensorHeader {
        self.0.state.lock().headers[id.index as usize].clone()
    }

    fn set_header(&self, id: TensorId, f: impl FnOnce(&mut TensorHeader)) {
        f(&mut self.0.state.lock().headers[id.index as usize]);
    }

    /// Raw pointer to the arena's backing buffer, for the executor's
    /// per-thread data handoff. See `DESIGN.md`'s "Unsafe code" section.
    pub(crate) fn arena_base_ptr(&self) -> *mut u8 {
        self.0.state.lock().arena.base_ptr()
    }

    fn alloc_fresh(
        &self,
        dtype: DType,
        ne: [usize; MAX_DIMS],
        op: OpKind,
        src0: Option<TensorId>,
        src1: Option<TensorId>,
        opt: [Option<TensorId>; 2],
    ) -> Result<TensorId, Error> {
        let nbytes = shape::numel(&ne) * dtype.size();
        let mut state = self.0.state.lock();
        let range = state.arena.alloc(nbytes).map_err(Error::from)?;
        let mut header = TensorHeader::leaf(dtype, ne, range);
        header.op = op;
        header.src0 = src0;
        header.src1 = src1;
        header.opt = opt;
        #[allow(clippy::cast_possible_truncation)]
        let index = state.headers.len() as u32;
        state.headers.push(header);
        Ok(TensorId {
            ctx_id: self.0.id,
            index,
        })
    }

    /// Pushes a non-owning alias node that reuses an existing data range
    /// with a caller-supplied shape/stride, rather than bump-allocating.
    /// Used by `VIEW`/`RESHAPE`/`PERMUTE`/`TRANSPOSE` (aliasing `src0`'s
    /// storage) and by `CPY` (aliasing its destination's storage).
    pub(crate) fn push_alias(
        &self,
        dtype: DType,
        ne: [usize; MAX_DIMS],
        nb: [usize; MAX_DIMS],
        data: Range<usize>,
        op: OpKind,
        src0: Option<TensorId>,
        src1: Option<TensorId>,
        opt: [Option<TensorId>; 2],
    ) -> TensorId {
        let mut state = self.0.state.lock();
        let mut header = TensorHeader::leaf(dtype, ne, data);
        header.nb = nb;
        header.op = op;
        header.src0 = src0;
        header.src1 = src1;
        header.opt = opt;
        #[allow(clippy::cast_possible_truncation)]
        let index = state.headers.len() as u32;
        state.headers.push(header);
        TensorId {
            ctx_id: self.0.id,
            index,
        }
    }

    /// Convenience wrapper over [`Context::push_alias`] for pure views (no `src1`).
    pub(crate) fn push_view(
        &self,
        dtype: DType,
        ne: [usize; MAX_DIMS],
        nb: [usize; MAX_DIMS],
        data: Range<usize>,
        op: OpKind,
        src0: Option<TensorId>,
        opt: [Option<TensorId>; 2],
    ) -> TensorId {
        self.push_alias(dtype, ne, nb, data, op, src0, None, opt)
    }

    /// Pushes a node that bump-allocates fresh storage for its output.
    pub(crate) fn push_fresh(
        &self,
        dtype: DType,
        ne: [usize; MAX_DIMS],
        op: OpKind,
        src0: Option<TensorId>,
        src1: Option<TensorId>,
        opt: [Option<TensorId>; 2],
    ) -> Result<TensorId, Error> {
        self.alloc_fresh(dtype, ne, op, src0, src1, opt)
    }

    fn new_tensor(&self, dtype: DType, ne: [usize; MAX_DIMS]) -> Result<Tensor, Error> {
        let id = self.alloc_fresh(dtype, ne, OpKind::None, None, None, [None, None])?;
        Ok(Tensor::new(self.clone(), id))
    }

    /// Allocates a fresh 1D tensor.
    ///
    /// # Errors
    ///
    /// [`ContextError::OutOfArena`] if the arena cannot satisfy the request.
    pub fn new_tensor_1d(&self, dtype: DType, ne0: usize) -> Result<Tensor, Error> {
        self.new_tensor(dtype, [ne0, 1, 1, 1])
    }

    /// Allocates a fresh 2D tensor.
    ///
    /// # Errors
    ///
    /// Same as [`Context::new_tensor_1d`].
    pub fn new_tensor_2d(&self, dtype: DType, ne0: usize, ne1: usize) -> Result<Tensor, Error> {
        self.new_tensor(dtype, [ne0, ne1, 1, 1])
    }

    /// Allocates a fresh 3D tensor.
    ///
    /// # Errors
    ///
    /// Same as [`Context::new_tensor_1d`].
    pub fn new_tensor_3d(
        &self,
        dtype: DType,
        ne0: usize,
        ne1: usize,
        ne2: usize,
    ) -> Result<Tensor, Error> {
        self.new_tensor(dtype, [ne0, ne1, ne2, 1])
    }

    /// Allocates a fresh 4D tensor.
    ///
    /// # Errors
    ///
    /// Same as [`Context::new_tensor_1d`].
    pub fn new_tensor_4d(
        &self,
        dtype: DType,
        ne0: usize,
        ne1: usize,
        ne2: usize,
        ne3: usize,
    ) -> Result<Tensor, Error> {
        self.new_tensor(dtype, [ne0, ne1, ne2, ne3])
    }

    /// Allocates an `I32` scalar tensor.
    ///
    /// # Errors
    ///
    /// Same as [`Context::new_tensor_1d`].
    pub fn new_scalar_i32(&self, value: i32) -> Result<Tensor, Error> {
        let t = self.new_tensor(DType::I32, [1, 1, 1, 1])?;
        t.set_i32_1d(0, value)?;
        Ok(t)
    }

    /// Allocates an `F32` scalar tensor.
    ///
    /// # Errors
    ///
    /// Same as [`Context::new_tensor_1d`].
    pub fn new_scalar_f32(&self, value: f32) -> Result<Tensor, Error> {
        let t = self.new_tensor(DType::F32, [1, 1, 1, 1])?;
        t.set_f32_1d(0, value)?;
        Ok(t)
    }

    /// Allocates a fresh tensor with `src`'s shape and dtype, wired as a
    /// `DUP` node (its backward rule is identity, §4.5).
    ///
    /// # Errors
    ///
    /// [`TensorError::InvalidContext`] if `src` belongs to a different
    /// context. Otherwise as [`Context::new_tensor_1d`].
    pub fn dup_tensor(&self, src: &Tensor) -> Result<Tensor, Error> {
        self.check_owner(src.id())?;
        let h = self.header(src.id());
        let id = self.alloc_fresh(h.dtype, h.ne, OpKind::Dup, Some(src.id()), None, [None, None])?;
        Ok(Tensor::new(self.clone(), id))
    }

    /// Creates a non-owning view of `src` with shape `ne`, a byte offset of
    /// `offset` into `src`'s data, and row-major strides for `ne`.
    ///
    /// # Errors
    ///
    /// [`TensorError::InvalidContext`] if `src` belongs to a different
    /// context. [`TensorError::ShapeMismatch`] if the view would read past
    /// `src`'s allocation.
    pub fn view_tensor(
        &self,
        src: &Tensor,
        ne: [usize; MAX_DIMS],
        offset: usize,
    ) -> Result<Tensor, Error> {
        self.check_owner(src.id())?;
        let h = self.header(src.id());
        let nbytes = shape::numel(&ne) * h.dtype.size();
        if offset + nbytes > h.data.end - h.data.start {
            return Err(TensorError::ShapeMismatch(format!(
                "view of {nbytes} bytes at offset {offset} exceeds source tensor's {} bytes",
                h.data.end - h.data.start
            ))
            .into());
        }
        let start = h.data.start + offset;
        let nb = shape::contiguous_strides(&ne, h.dtype.size());
        let id = self.push_view(h.dtype, ne, nb, start..start + nbytes, OpKind::View, Some(src.id()), [None, None]);
        Ok(Tensor::new(self.clone(), id))
    }

    /// Shorthand for [`Context::view_tensor`] with a 1D shape.
    ///
    /// # Errors
    ///
    /// Same as [`Context::view_tensor`].
    pub fn view_1d(&self, src: &Tensor, ne0: usize, offset: usize) -> Result<Tensor, Error> {
        self.view_tensor(src, [ne0, 1, 1, 1], offset)
    }

    /// Shorthand for [`Context::view_tensor`] with a 2D shape.
    ///
    /// # Errors
    ///
    /// Same as [`Context::view_tensor`].
    pub fn view_2d(
        &self,
        src: &Tensor,
        ne0: usize,
        ne1: usize,
        offset: usize,
    ) -> Result<Tensor, Error> {
        self.view_tensor(src, [ne0, ne1, 1, 1], offset)
    }

    /// Marks `t` as trainable: subsequent [`crate::graph::Graph::build_backward`]
    /// calls allocate and accumulate into its gradient tensor.
    ///
    /// # Errors
    ///
    /// [`TensorError::InvalidContext`] if `t` belongs to a different context.
    pub fn set_param(&self, t: &Tensor) -> Result<(), Error> {
        self.check_owner(t.id())?;
        let h = self.header(t.id());
        let grad_id = self.alloc_fresh(h.dtype, h.ne, OpKind::None, None, None, [None, None])?;
        self.set_header(t.id(), |h| {
            h.is_param = true;
            h.grad = Some(grad_id);
        });
        Ok(())
    }

    pub(crate) fn set_grad(&self, t: TensorId, grad: TensorId) {
        self.set_header(t, |h| h.grad = Some(grad));
    }

    pub(crate) fn set_name(&self, t: TensorId, name: String) {
        self.set_header(t, |h| h.name = Some(name));
    }

    /// Zeroes a tensor's backing bytes in place, dtype-agnostic.
    ///
    /// Used by [`crate::graph::Graph::reset`] to clear accumulated
    /// gradients between training iterations without reallocating.
    pub(crate) fn zero_data(&self, id: TensorId) {
        let h = self.header(id);
        let mut state = self.0.state.lock();
        state.arena.get_mut(h.data).fill(0);
    }

    fn data_slice(&self, id: TensorId) -> (DType, Range<usize>) {
        let h = self.header(id);
        (h.dtype, h.data)
    }

    /// Reads the linear-indexed `f32` element `i`.
    ///
    /// # Errors
    ///
    /// [`TensorError::InvalidContext`], [`TensorError::InvalidDType`] if
    /// not `F32`, or [`TensorError::InvalidIndex`] if out of bounds.
    pub fn get_f32_1d(&self, id: TensorId, i: usize) -> Result<f32, Error> {
        self.check_owner(id)?;
        let (dtype, range) = self.data_slice(id);
        if dtype != DType::F32 {
            return Err(TensorError::InvalidDType(format!("expected F32, found {dtype:?}")).into());
        }
        let state = self.0.state.lock();
        let bytes = state.arena.get(range);
        let byte_off = i * 4;
        bytes
            .get(byte_off..byte_off + 4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .ok_or_else(|| TensorError::InvalidIndex(format!("index {i} out of bounds")).into())
    }

    /// Writes the linear-indexed `f32` element `i`.
    ///
    /// # Errors
    ///
    /// Same as [`Context::get_f32_1d`].
    pub fn set_f32_1d(&self, id: TensorId, i: usize, value: f32) -> Result<(), Error> {
        self.check_owner(id)?;
        let (dtype, range) = self.data_slice(id);
        if dtype != DType::F32 {
            return Err(TensorError::InvalidDType(format!("expected F32, found {dtype:?}")).into());
        }
        let mut state = self.0.state.lock();
        let bytes = state.arena.get_mut(range);
        let byte_off = i * 4;
        if byte_off + 4 > bytes.len() {
            return Err(TensorError::InvalidIndex(format!("index {i} out of bounds")).into());
        }
        bytes[byte_off..byte_off + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Reads the linear-indexed `i32` element `i`.
    ///
    /// Restricted to integer dtypes (`I8`/`I16`/`I32`): an implicit
    /// float-to-int reinterpretation would silently misread an `F16`/`F32`
    /// tensor's bit pattern as a quantized integer, which the spec's
    /// §9 FP16-quantization note flags as the likely source of a latent
    /// bug in the reference implementation.
    ///
    /// # Errors
    ///
    /// [`TensorError::InvalidContext`], [`TensorError::InvalidDType`] if
    /// not an integer dtype, or [`TensorError::InvalidIndex`] if out of bounds.
    pub fn get_i32_1d(&self, id: TensorId, i: usize) -> Result<i32, Error> {
        self.check_owner(id)?;
        let (dtype, range) = self.data_slice(id);
        if !dtype.is_integer() {
            return Err(TensorError::InvalidDType(format!(
                "expected an integer dtype, found {dtype:?}"
            ))
            .into());
        }
        let state = self.0.state.lock();
        let bytes = state.arena.get(range);
        let value = match dtype {
            DType::I8 => i32::from(*bytes.get(i).ok_or_else(|| {
                Error::from(TensorError::InvalidIndex(format!("index {i} out of bounds")))
            })? as i8),
            DType::I16 => {
                let o = i * 2;
                let b = bytes
                    .get(o..o + 2)
                    .ok_or_else(|| TensorError::InvalidIndex(format!("index {i} out of bounds")))?;
                i32::from(i16::from_le_bytes([b[0], b[1]]))
            }
            DType::I32 => {
                let o = i * 4;
                let b = bytes
                    .get(o..o + 4)
                    .ok_or_else(|| TensorError::InvalidIndex(format!("index {i} out of bounds")))?;
                i32::from_le_bytes([b[0], b[1], b[2], b[3]])
            }
            DType::F16 | DType::F32 => unreachable!("checked is_integer above"),
        };
        Ok(value)
    }

    /// Writes the linear-indexed `i32` element `i`, truncating to the
    /// tensor's actual integer width.
    ///
    /// # Errors
    ///
    /// Same as [`Context::get_i32_1d`].
    pub fn set_i32_1d(&self, id: TensorId, i: usize, value: i32) -> Result<(), Error> {
        self.check_owner(id)?;
        let (dtype, range) = self.data_slice(id);
        if !dtype.is_integer() {
            return Err(TensorError::InvalidDType(format!(
                "expected an integer dtype, found {dtype:?}"
            ))
            .into());
        }
        let mut state = self.0.state.lock();
        let bytes = state.arena.get_mut(range);
        match dtype {
            #[allow(clippy::cast_possible_truncation)]
            DType::I8 => {
                *bytes
                    .get_mut(i)
                    .ok_or_else(|| TensorError::InvalidIndex(format!("index {i} out of bounds")))? =
                    value as i8 as u8;
            }
            #[allow(clippy::cast_possible_truncation)]
            DType::I16 => {
                let o = i * 2;
                let b = bytes
                    .get_mut(o..o + 2)
                    .ok_or_else(|| TensorError::InvalidIndex(format!("index {i} out of bounds")))?;
                b.copy_from_slice(&(value as i16).to_le_bytes());
            }
            DType::I32 => {
                let o = i * 4;
                let b = bytes
                    .get_mut(o..o + 4)
                    .ok_or_else(|| TensorError::InvalidIndex(format!("index {i} out of bounds")))?;
                b.copy_from_slice(&value.to_le_bytes());
            }
            DType::F16 | DType::F32 => unreachable!("checked is_integer above"),
        }
        Ok(())
    }

    /// Copies this tensor's data out as a `Vec<f32>` in row-major order.
    ///
    /// Requires a contiguous tensor; pass the tensor through a `CPY` node
    /// first if it is a non-contiguous view or permutation.
    ///
    /// # Errors
    ///
    /// [`TensorError::ShapeMismatch`] if the tensor is not contiguous.
    pub fn to_vec_f32(&self, id: TensorId) -> Result<Vec<f32>, Error> {
        self.check_owner(id)?;
        let h = self.header(id);
        if !h.is_contiguous() {
            return Err(TensorError::ShapeMismatch(
                "to_vec_f32 requires a contiguous tensor".into(),
            )
            .into());
        }
        let numel = h.numel();
        let state = self.0.state.lock();
        let bytes = state.arena.get(h.data.clone());
        let out = match h.dtype {
            DType::F32 => bytes
                .chunks_exact(4)
                .take(numel)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
            DType::F16 => bytes
                .chunks_exact(2)
                .take(numel)
                .map(|b| crate::dtype::F16(u16::from_le_bytes([b[0], b[1]])).to_f32())
                .collect(),
            DType::I32 => bytes
                .chunks_exact(4)
                .take(numel)
                .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32)
                .collect(),
            DType::I16 => bytes
                .chunks_exact(2)
                .take(numel)
                .map(|b| f32::from(i16::from_le_bytes([b[0], b[1]])))
                .collect(),
            #[allow(clippy::cast_possible_wrap)]
            DType::I8 => bytes.iter().take(numel).map(|&b| f32::from(b as i8)).collect(),
        };
        Ok(out)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        log::trace!("context {} free: {} bytes used", self.id, self.state.lock().arena.used());
        release_slot(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn used_mem_grows_with_each_allocation() {
        let ctx = Context::init(1 << 16);
        let before = ctx.used_mem();
        ctx.new_tensor_1d(DType::F32, 16).unwrap();
        assert!(ctx.used_mem() > before);
        assert!(ctx.used_mem() <= ctx.capacity());
    }

    #[test]
    fn dup_tensor_copies_shape_and_dtype() {
        let ctx = Context::init(1 << 16);
        let a = ctx.new_tensor_2d(DType::F32, 3, 2).unwrap();
        let b = ctx.dup_tensor(&a).unwrap();
        assert_eq!(b.shape(), a.shape());
        assert_eq!(b.dtype(), a.dtype());
        assert_eq!(b.op(), OpKind::Dup);
    }

    #[test]
    fn dup_tensor_rejects_foreign_context() {
        let ctx_a = Context::init(1 << 16);
        let ctx_b = Context::init(1 << 16);
        let a = ctx_a.new_tensor_1d(DType::F32, 4).unwrap();
        let err = ctx_b.dup_tensor(&a).unwrap_err();
        assert!(matches!(err, Error::Tensor(TensorError::InvalidContext { .. })));
    }

    #[test]
    fn view_1d_aliases_source_data() {
        let ctx = Context::init(1 << 16);
        let a = ctx.new_tensor_1d(DType::F32, 8).unwrap();
        for i in 0..8 {
            a.set_f32_1d(i, i as f32).unwrap();
        }
        let v = ctx.view_1d(&a, 4, 4 * 4).unwrap();
        assert_eq!(v.shape()[0], 4);
        assert_eq!(v.get_f32_1d(0).unwrap(), 4.0);
        assert_eq!(v.get_f32_1d(3).unwrap(), 7.0);
    }

    #[test]
    fn view_past_source_end_is_shape_mismatch() {
        let ctx = Context::init(1 << 16);
        let a = ctx.new_tensor_1d(DType::F32, 4).unwrap();
        let err = ctx.view_1d(&a, 4, 4).unwrap_err();
        assert!(matches!(err, Error::Tensor(TensorError::ShapeMismatch(_))));
    }

    #[test]
    fn view_2d_reads_correct_rows() {
        let ctx = Context::init(1 << 16);
        let a = ctx.new_tensor_2d(DType::F32, 3, 3).unwrap();
        for i in 0..9 {
            a.set_f32_1d(i, i as f32).unwrap();
        }
        let row1 = ctx.view_2d(&a, 3, 1, 3 * 4).unwrap();
        assert_eq!(row1.to_vec_f32().unwrap(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn set_param_allocates_a_zeroed_grad() {
        let ctx = Context::init(1 << 16);
        let a = ctx.new_scalar_f32(1.0).unwrap();
        assert!(a.grad().is_none());
        ctx.set_param(&a).unwrap();
        assert!(a.is_param());
        let grad = a.grad().unwrap();
        assert_eq!(grad.get_f32_1d(0).unwrap(), 0.0);
    }

    #[test]
    fn i32_round_trips_through_i8_i16_i32() {
        let ctx = Context::init(1 << 16);
        let i8t = ctx.new_tensor_1d(DType::I8, 1).unwrap();
        i8t.set_i32_1d(0, -5).unwrap();
        assert_eq!(i8t.get_i32_1d(0).unwrap(), -5);

        let i16t = ctx.new_tensor_1d(DType::I16, 1).unwrap();
        i16t.set_i32_1d(0, 12345).unwrap();
        assert_eq!(i16t.get_i32_1d(0).unwrap(), 12345);

        let i32t = ctx.new_scalar_i32(-70000).unwrap();
        assert_eq!(i32t.get_i32_1d(0).unwrap(), -70000);
    }

    #[test]
    fn get_i32_on_float_tensor_is_invalid_dtype() {
        let ctx = Context::init(1 << 16);
        let f = ctx.new_scalar_f32(1.0).unwrap();
        let err = f.get_i32_1d(0).unwrap_err();
        assert!(matches!(err, Error::Tensor(TensorError::InvalidDType(_))));
    }

    #[test]
    fn out_of_bounds_index_is_invalid_index() {
        let ctx = Context::init(1 << 16);
        let a = ctx.new_tensor_1d(DType::F32, 2).unwrap();
        let err = a.get_f32_1d(5).unwrap_err();
        assert!(matches!(err, Error::Tensor(TensorError::InvalidIndex(_))));
    }

    #[test]
    fn to_vec_f32_rejects_non_contiguous_tensor() {
        let ctx = Context::init(1 << 16);
        let a = ctx.new_tensor_2d(DType::F32, 3, 2).unwrap();
        let t = crate::ops::build::transpose(&a).unwrap();
        let err = t.to_vec_f32().unwrap_err();
        assert!(matches!(err, Error::Tensor(TensorError::ShapeMismatch(_))));
    }

    #[test]
    fn tensor_from_wrong_context_is_rejected_by_get_f32() {
        let ctx_a = Context::init(1 << 16);
        let ctx_b = Context::init(1 << 16);
        let a = ctx_a.new_tensor_1d(DType::F32, 1).unwrap();
        let err = ctx_b.get_f32_1d(a.id(), 0).unwrap_err();
        assert!(matches!(err, Error::Tensor(TensorError::InvalidContext { .. })));
    }

    #[test]
    fn no_free_context_once_all_slots_are_taken() {
        let mut held = Vec::new();
        let mut hit_limit = false;
        for _ in 0..MAX_CONTEXTS + 1 {
            match Context::try_init(1024) {
                Ok(ctx) => held.push(ctx),
                Err(Error::Context(ContextError::NoFreeContext)) => {
                    hit_limit = true;
                    break;
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert!(hit_limit, "expected to exhaust {MAX_CONTEXTS} context slots");
    }
}
