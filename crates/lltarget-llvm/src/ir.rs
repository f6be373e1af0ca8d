//! Minimal IR handles consumed by the target bindings.
//!
//! Data-layout queries need types and globals, emission needs a module, and
//! the caller receives emitted code as a memory buffer. Only what those
//! bindings consume is wrapped here.

use std::ffi::c_char;
use std::fmt;
use std::marker::PhantomData;
use std::ptr;

use llvm_sys::core::{
    LLVMAddGlobal, LLVMArrayType, LLVMContextCreate, LLVMContextDispose,
    LLVMCountStructElementTypes, LLVMCreateMemoryBufferWithMemoryRangeCopy,
    LLVMDisposeMemoryBuffer, LLVMDisposeModule, LLVMDoubleTypeInContext, LLVMFloatTypeInContext,
    LLVMGetBufferSize, LLVMGetBufferStart, LLVMGetFirstFunction, LLVMGetNextFunction,
    LLVMGetTarget, LLVMGetTypeKind, LLVMGetValueName2, LLVMInt1TypeInContext,
    LLVMInt8TypeInContext, LLVMInt16TypeInContext, LLVMInt32TypeInContext, LLVMInt64TypeInContext,
    LLVMIntTypeInContext, LLVMIsDeclaration, LLVMModuleCreateWithNameInContext, LLVMPointerType,
    LLVMPrintModuleToString, LLVMPrintTypeToString, LLVMSetAlignment, LLVMSetTarget,
    LLVMStructTypeInContext,
};
use llvm_sys::ir_reader::LLVMParseIRInContext;
use llvm_sys::prelude::{
    LLVMContextRef, LLVMMemoryBufferRef, LLVMModuleRef, LLVMTypeRef, LLVMValueRef,
};
use llvm_sys::target::{LLVMGetModuleDataLayout, LLVMSetModuleDataLayout};
use llvm_sys::LLVMTypeKind;

use crate::data_layout::DataLayout;
use crate::errors::{TargetError, TargetResult};
use crate::message::{take_message, to_cstring};

/// An owned LLVM context. Every module and type borrows from one.
pub struct Context {
    raw: LLVMContextRef,
}

impl Context {
    pub fn new() -> Self {
        let raw = unsafe { LLVMContextCreate() };
        Context { raw }
    }

    pub(crate) fn as_raw(&self) -> LLVMContextRef {
        self.raw
    }

    pub fn bool_type(&self) -> Type<'_> {
        unsafe { Type::from_raw(LLVMInt1TypeInContext(self.raw)) }
    }

    pub fn i8_type(&self) -> Type<'_> {
        unsafe { Type::from_raw(LLVMInt8TypeInContext(self.raw)) }
    }

    pub fn i16_type(&self) -> Type<'_> {
        unsafe { Type::from_raw(LLVMInt16TypeInContext(self.raw)) }
    }

    pub fn i32_type(&self) -> Type<'_> {
        unsafe { Type::from_raw(LLVMInt32TypeInContext(self.raw)) }
    }

    pub fn i64_type(&self) -> Type<'_> {
        unsafe { Type::from_raw(LLVMInt64TypeInContext(self.raw)) }
    }

    pub fn int_type(&self, bits: u32) -> Type<'_> {
        unsafe { Type::from_raw(LLVMIntTypeInContext(self.raw, bits)) }
    }

    pub fn f32_type(&self) -> Type<'_> {
        unsafe { Type::from_raw(LLVMFloatTypeInContext(self.raw)) }
    }

    pub fn f64_type(&self) -> Type<'_> {
        unsafe { Type::from_raw(LLVMDoubleTypeInContext(self.raw)) }
    }

    /// An `i8` pointer in the given address space.
    pub fn ptr_type(&self, address_space: u32) -> Type<'_> {
        unsafe {
            Type::from_raw(LLVMPointerType(
                LLVMInt8TypeInContext(self.raw),
                address_space,
            ))
        }
    }

    pub fn array_type<'ctx>(&'ctx self, element: Type<'ctx>, len: u32) -> Type<'ctx> {
        unsafe { Type::from_raw(LLVMArrayType(element.raw, len)) }
    }

    /// A literal (unnamed) struct type.
    pub fn struct_type<'ctx>(&'ctx self, fields: &[Type<'ctx>], packed: bool) -> Type<'ctx> {
        let mut raw_fields: Vec<LLVMTypeRef> = fields.iter().map(|ty| ty.raw).collect();
        unsafe {
            Type::from_raw(LLVMStructTypeInContext(
                self.raw,
                raw_fields.as_mut_ptr(),
                raw_fields.len() as u32,
                packed as i32,
            ))
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        unsafe { LLVMContextDispose(self.raw) }
    }
}

/// A type owned by a [`Context`].
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Type<'ctx> {
    raw: LLVMTypeRef,
    _context: PhantomData<&'ctx Context>,
}

impl<'ctx> Type<'ctx> {
    pub(crate) unsafe fn from_raw(raw: LLVMTypeRef) -> Self {
        debug_assert!(!raw.is_null());
        Type {
            raw,
            _context: PhantomData,
        }
    }

    pub(crate) fn as_raw(&self) -> LLVMTypeRef {
        self.raw
    }

    pub fn is_struct(&self) -> bool {
        matches!(
            unsafe { LLVMGetTypeKind(self.raw) },
            LLVMTypeKind::LLVMStructTypeKind
        )
    }

    /// Number of fields, or `None` for non-struct types.
    pub fn struct_element_count(&self) -> Option<u32> {
        self.is_struct()
            .then(|| unsafe { LLVMCountStructElementTypes(self.raw) })
    }
}

impl fmt::Display for Type<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = unsafe { take_message(LLVMPrintTypeToString(self.raw)) };
        f.write_str(&text)
    }
}

impl fmt::Debug for Type<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({self})")
    }
}

/// A global variable declared in a [`Module`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlobalValue<'ctx> {
    raw: LLVMValueRef,
    _context: PhantomData<&'ctx Context>,
}

impl GlobalValue<'_> {
    pub(crate) fn as_raw(&self) -> LLVMValueRef {
        self.raw
    }

    pub fn set_alignment(&self, bytes: u32) {
        unsafe { LLVMSetAlignment(self.raw, bytes) }
    }
}

/// A function defined or declared in a [`Module`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FunctionValue<'ctx> {
    raw: LLVMValueRef,
    _context: PhantomData<&'ctx Context>,
}

impl FunctionValue<'_> {
    pub(crate) fn as_raw(&self) -> LLVMValueRef {
        self.raw
    }

    pub fn name(&self) -> String {
        let mut len = 0usize;
        let ptr = unsafe { LLVMGetValueName2(self.raw, &mut len) };
        if ptr.is_null() {
            return String::new();
        }
        let bytes = unsafe { std::slice::from_raw_parts(ptr as *const u8, len) };
        String::from_utf8_lossy(bytes).into_owned()
    }

    pub fn is_declaration(&self) -> bool {
        unsafe { LLVMIsDeclaration(self.raw) != 0 }
    }
}

/// An owned module.
pub struct Module<'ctx> {
    raw: LLVMModuleRef,
    _context: PhantomData<&'ctx Context>,
}

impl<'ctx> Module<'ctx> {
    pub fn new(name: &str, context: &'ctx Context) -> TargetResult<Self> {
        let name = to_cstring(name)?;
        let raw = unsafe { LLVMModuleCreateWithNameInContext(name.as_ptr(), context.as_raw()) };
        Ok(Module {
            raw,
            _context: PhantomData,
        })
    }

    /// Parse textual IR into a new module.
    pub fn parse_ir(context: &'ctx Context, name: &str, source: &str) -> TargetResult<Self> {
        let buffer_name = to_cstring(name)?;
        let buffer = unsafe {
            LLVMCreateMemoryBufferWithMemoryRangeCopy(
                source.as_ptr() as *const c_char,
                source.len(),
                buffer_name.as_ptr(),
            )
        };

        let mut module: LLVMModuleRef = ptr::null_mut();
        let mut message: *mut c_char = ptr::null_mut();
        // The parser takes ownership of `buffer`.
        let failed =
            unsafe { LLVMParseIRInContext(context.as_raw(), buffer, &mut module, &mut message) };
        if failed != 0 {
            let message = unsafe { take_message(message) };
            tracing::debug!(module = name, %message, "IR parse failed");
            return Err(TargetError::ir_parse(message));
        }

        Ok(Module {
            raw: module,
            _context: PhantomData,
        })
    }

    pub(crate) fn as_raw(&self) -> LLVMModuleRef {
        self.raw
    }

    pub fn set_triple(&mut self, triple: &str) -> TargetResult<()> {
        let triple = to_cstring(triple)?;
        unsafe { LLVMSetTarget(self.raw, triple.as_ptr()) };
        Ok(())
    }

    pub fn triple(&self) -> String {
        unsafe { crate::message::borrowed_str(LLVMGetTarget(self.raw)) }
    }

    /// Replace the module's data layout with a copy of `layout`.
    pub fn set_data_layout(&mut self, layout: &DataLayout) {
        unsafe { LLVMSetModuleDataLayout(self.raw, layout.as_raw()) }
    }

    /// A fresh copy of the module's data layout.
    ///
    /// The module keeps ownership of its own layout, so the result is
    /// rebuilt from its string form.
    pub fn data_layout(&self) -> DataLayout {
        unsafe { DataLayout::copy_from_raw(LLVMGetModuleDataLayout(self.raw)) }
    }

    pub fn add_global(&self, ty: Type<'ctx>, name: &str) -> TargetResult<GlobalValue<'ctx>> {
        let name = to_cstring(name)?;
        let raw = unsafe { LLVMAddGlobal(self.raw, ty.as_raw(), name.as_ptr()) };
        Ok(GlobalValue {
            raw,
            _context: PhantomData,
        })
    }

    pub fn functions(&self) -> impl Iterator<Item = FunctionValue<'ctx>> + '_ {
        let first = unsafe { LLVMGetFirstFunction(self.raw) };
        std::iter::successors((!first.is_null()).then_some(first), |&f| {
            let next = unsafe { LLVMGetNextFunction(f) };
            (!next.is_null()).then_some(next)
        })
        .map(|raw| FunctionValue {
            raw,
            _context: PhantomData,
        })
    }

    pub fn print_to_string(&self) -> String {
        unsafe { take_message(LLVMPrintModuleToString(self.raw)) }
    }
}

impl Drop for Module<'_> {
    fn drop(&mut self) {
        unsafe { LLVMDisposeModule(self.raw) }
    }
}

impl fmt::Debug for Module<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("triple", &self.triple())
            .finish_non_exhaustive()
    }
}

/// An owned memory buffer, as returned by in-memory code emission.
pub struct MemoryBuffer {
    raw: LLVMMemoryBufferRef,
}

impl MemoryBuffer {
    /// # Safety
    ///
    /// `raw` must be a valid buffer whose ownership passes to the result.
    pub(crate) unsafe fn from_raw(raw: LLVMMemoryBufferRef) -> Self {
        debug_assert!(!raw.is_null());
        MemoryBuffer { raw }
    }

    pub fn as_bytes(&self) -> &[u8] {
        unsafe {
            let start = LLVMGetBufferStart(self.raw) as *const u8;
            let len = LLVMGetBufferSize(self.raw);
            if start.is_null() || len == 0 {
                return &[];
            }
            std::slice::from_raw_parts(start, len)
        }
    }

    pub fn len(&self) -> usize {
        unsafe { LLVMGetBufferSize(self.raw) }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for MemoryBuffer {
    fn drop(&mut self) {
        unsafe { LLVMDisposeMemoryBuffer(self.raw) }
    }
}

impl fmt::Debug for MemoryBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBuffer")
            .field("len", &self.len())
            .finish()
    }
}
