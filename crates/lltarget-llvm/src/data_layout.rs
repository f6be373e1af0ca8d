//! Target data layouts.
//!
//! A data layout is LLVM's string-encoded description of a target's
//! endianness, pointer sizes per address space and alignment rules. Every
//! size and alignment reported here is computed by LLVM; this module only
//! marshals the query.
//!
//! [`DataLayout`] always owns its descriptor. Layouts that belong to a
//! target machine or a module are copied before being wrapped, so dropping a
//! `DataLayout` never frees memory owned by anything else.

use std::fmt;

use llvm_sys::target::{
    LLVMABIAlignmentOfType, LLVMABISizeOfType, LLVMByteOrder, LLVMByteOrdering,
    LLVMCallFrameAlignmentOfType, LLVMCopyStringRepOfTargetData, LLVMCreateTargetData,
    LLVMDisposeTargetData, LLVMElementAtOffset, LLVMIntPtrTypeForASInContext,
    LLVMIntPtrTypeInContext, LLVMOffsetOfElement, LLVMPointerSize, LLVMPointerSizeForAS,
    LLVMPreferredAlignmentOfGlobal, LLVMPreferredAlignmentOfType, LLVMSizeOfTypeInBits,
    LLVMStoreSizeOfType, LLVMTargetDataRef,
};
use serde::Serialize;

use crate::errors::{TargetError, TargetResult};
use crate::ir::{Context, GlobalValue, Type};
use crate::message::{take_message, to_cstring};

/// Byte order of a data layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Endian {
    Big,
    Little,
}

impl fmt::Display for Endian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endian::Big => f.write_str("big-endian"),
            Endian::Little => f.write_str("little-endian"),
        }
    }
}

/// An owned data-layout descriptor.
pub struct DataLayout {
    raw: LLVMTargetDataRef,
}

impl DataLayout {
    /// Parse a data-layout string such as `e-m:e-i64:64-n8:16:32:64-S128`.
    ///
    /// LLVM has no error channel for this call: a malformed layout string
    /// is reported by LLVM as a fatal error. Only strings that cannot be
    /// passed to C at all are rejected here.
    pub fn parse(spec: &str) -> TargetResult<Self> {
        let spec = to_cstring(spec)?;
        let raw = unsafe { LLVMCreateTargetData(spec.as_ptr()) };
        tracing::trace!(layout = ?spec, "created data layout");
        Ok(DataLayout { raw })
    }

    /// Take ownership of a freshly created descriptor.
    ///
    /// # Safety
    ///
    /// `raw` must be valid and not owned by anything else.
    pub(crate) unsafe fn from_owned_raw(raw: LLVMTargetDataRef) -> Self {
        debug_assert!(!raw.is_null());
        DataLayout { raw }
    }

    /// Deep-copy a descriptor owned by someone else.
    ///
    /// # Safety
    ///
    /// `raw` must be valid for the duration of the call.
    pub(crate) unsafe fn copy_from_raw(raw: LLVMTargetDataRef) -> Self {
        let spec = unsafe { LLVMCopyStringRepOfTargetData(raw) };
        let copy = unsafe { LLVMCreateTargetData(spec) };
        unsafe { take_message(spec) };
        DataLayout { raw: copy }
    }

    pub(crate) fn as_raw(&self) -> LLVMTargetDataRef {
        self.raw
    }

    /// The canonical string form of this layout.
    pub fn as_string(&self) -> String {
        unsafe { take_message(LLVMCopyStringRepOfTargetData(self.raw)) }
    }

    pub fn byte_order(&self) -> Endian {
        match unsafe { LLVMByteOrder(self.raw) } {
            LLVMByteOrdering::LLVMBigEndian => Endian::Big,
            LLVMByteOrdering::LLVMLittleEndian => Endian::Little,
        }
    }

    /// Pointer size in bytes for address space 0.
    pub fn pointer_size(&self) -> u32 {
        unsafe { LLVMPointerSize(self.raw) }
    }

    pub fn pointer_size_for_address_space(&self, address_space: u32) -> u32 {
        unsafe { LLVMPointerSizeForAS(self.raw, address_space) }
    }

    /// The integer type as wide as a pointer in address space 0.
    pub fn int_ptr_type<'ctx>(&self, context: &'ctx Context) -> Type<'ctx> {
        unsafe { Type::from_raw(LLVMIntPtrTypeInContext(context.as_raw(), self.raw)) }
    }

    pub fn int_ptr_type_for_address_space<'ctx>(
        &self,
        context: &'ctx Context,
        address_space: u32,
    ) -> Type<'ctx> {
        unsafe {
            Type::from_raw(LLVMIntPtrTypeForASInContext(
                context.as_raw(),
                self.raw,
                address_space,
            ))
        }
    }

    pub fn size_in_bits(&self, ty: Type<'_>) -> u64 {
        unsafe { LLVMSizeOfTypeInBits(self.raw, ty.as_raw()) }
    }

    /// Maximum number of bytes a store of `ty` may overwrite.
    pub fn store_size(&self, ty: Type<'_>) -> u64 {
        unsafe { LLVMStoreSizeOfType(self.raw, ty.as_raw()) }
    }

    /// Offset in bytes between successive objects of `ty`, padding included.
    pub fn abi_size(&self, ty: Type<'_>) -> u64 {
        unsafe { LLVMABISizeOfType(self.raw, ty.as_raw()) }
    }

    pub fn abi_alignment(&self, ty: Type<'_>) -> u32 {
        unsafe { LLVMABIAlignmentOfType(self.raw, ty.as_raw()) }
    }

    pub fn call_frame_alignment(&self, ty: Type<'_>) -> u32 {
        unsafe { LLVMCallFrameAlignmentOfType(self.raw, ty.as_raw()) }
    }

    pub fn preferred_alignment(&self, ty: Type<'_>) -> u32 {
        unsafe { LLVMPreferredAlignmentOfType(self.raw, ty.as_raw()) }
    }

    pub fn preferred_alignment_of_global(&self, global: GlobalValue<'_>) -> u32 {
        unsafe { LLVMPreferredAlignmentOfGlobal(self.raw, global.as_raw()) }
    }

    /// Index of the struct element containing byte `offset`.
    ///
    /// An empty struct has no element to report and is rejected.
    pub fn element_at_offset(&self, struct_ty: Type<'_>, offset: u64) -> TargetResult<u32> {
        let count = struct_ty
            .struct_element_count()
            .ok_or_else(|| TargetError::not_a_struct(struct_ty))?;
        if count == 0 {
            return Err(TargetError::element_out_of_range(0, 0));
        }
        Ok(unsafe { LLVMElementAtOffset(self.raw, struct_ty.as_raw(), offset) })
    }

    /// Byte offset of element `index` within a struct.
    pub fn offset_of_element(&self, struct_ty: Type<'_>, index: u32) -> TargetResult<u64> {
        let count = struct_ty
            .struct_element_count()
            .ok_or_else(|| TargetError::not_a_struct(struct_ty))?;
        if index >= count {
            return Err(TargetError::element_out_of_range(index, count));
        }
        Ok(unsafe { LLVMOffsetOfElement(self.raw, struct_ty.as_raw(), index) })
    }
}

impl Clone for DataLayout {
    fn clone(&self) -> Self {
        unsafe { DataLayout::copy_from_raw(self.raw) }
    }
}

impl PartialEq for DataLayout {
    fn eq(&self, other: &Self) -> bool {
        self.as_string() == other.as_string()
    }
}

impl Eq for DataLayout {}

impl Drop for DataLayout {
    fn drop(&mut self) {
        unsafe { LLVMDisposeTargetData(self.raw) }
    }
}

impl fmt::Display for DataLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl fmt::Debug for DataLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DataLayout").field(&self.as_string()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TargetErrorKind;
    use crate::ir::Module;

    const X86_64_LINUX: &str = "e-m:e-p270:32:32-p271:32:32-p272:64:64-i64:64-f80:128-n8:16:32:64-S128";
    const BIG_ENDIAN_32: &str = "E-m:e-p:32:32-i64:64-n32-S64";

    #[test]
    fn string_form_round_trips() {
        let layout = DataLayout::parse(X86_64_LINUX).unwrap();
        assert_eq!(layout.as_string(), X86_64_LINUX);

        let reparsed = DataLayout::parse(&layout.as_string()).unwrap();
        assert_eq!(reparsed, layout);
    }

    #[test]
    fn byte_order_and_pointer_sizes() {
        let little = DataLayout::parse(X86_64_LINUX).unwrap();
        assert_eq!(little.byte_order(), Endian::Little);
        assert_eq!(little.pointer_size(), 8);
        assert_eq!(little.pointer_size_for_address_space(270), 4);
        assert_eq!(little.pointer_size_for_address_space(272), 8);

        let big = DataLayout::parse(BIG_ENDIAN_32).unwrap();
        assert_eq!(big.byte_order(), Endian::Big);
        assert_eq!(big.pointer_size(), 4);
    }

    #[test]
    fn scalar_sizes_and_alignments() {
        let context = Context::new();
        let layout = DataLayout::parse(X86_64_LINUX).unwrap();

        let i1 = context.bool_type();
        assert_eq!(layout.size_in_bits(i1), 1);
        assert_eq!(layout.store_size(i1), 1);
        assert_eq!(layout.abi_size(i1), 1);

        let i64 = context.i64_type();
        assert_eq!(layout.size_in_bits(i64), 64);
        assert_eq!(layout.abi_alignment(i64), 8);
        assert_eq!(layout.call_frame_alignment(i64), 8);
        assert_eq!(layout.preferred_alignment(i64), 8);

        let i32 = context.i32_type();
        assert_eq!(layout.abi_size(i32), 4);
        assert_eq!(layout.abi_alignment(i32), 4);
    }

    #[test]
    fn int_ptr_type_matches_pointer_width() {
        let context = Context::new();
        let layout = DataLayout::parse(X86_64_LINUX).unwrap();
        assert_eq!(layout.int_ptr_type(&context).to_string(), "i64");
        assert_eq!(
            layout
                .int_ptr_type_for_address_space(&context, 270)
                .to_string(),
            "i32"
        );
    }

    #[test]
    fn struct_offsets_map_both_ways() {
        let context = Context::new();
        let layout = DataLayout::parse(X86_64_LINUX).unwrap();
        let ty = context.struct_type(
            &[context.i8_type(), context.i32_type(), context.i64_type()],
            false,
        );

        assert_eq!(layout.offset_of_element(ty, 0).unwrap(), 0);
        assert_eq!(layout.offset_of_element(ty, 1).unwrap(), 4);
        assert_eq!(layout.offset_of_element(ty, 2).unwrap(), 8);
        assert_eq!(layout.abi_size(ty), 16);

        assert_eq!(layout.element_at_offset(ty, 0).unwrap(), 0);
        assert_eq!(layout.element_at_offset(ty, 5).unwrap(), 1);
        assert_eq!(layout.element_at_offset(ty, 12).unwrap(), 2);
    }

    #[test]
    fn packed_struct_has_no_padding() {
        let context = Context::new();
        let layout = DataLayout::parse(X86_64_LINUX).unwrap();
        let ty = context.struct_type(&[context.i8_type(), context.i32_type()], true);
        assert_eq!(layout.offset_of_element(ty, 1).unwrap(), 1);
        assert_eq!(layout.abi_size(ty), 5);
    }

    #[test]
    fn element_queries_reject_non_structs() {
        let context = Context::new();
        let layout = DataLayout::parse(X86_64_LINUX).unwrap();

        let err = layout.offset_of_element(context.i32_type(), 0).unwrap_err();
        assert!(matches!(err.kind(), TargetErrorKind::NotAStruct(name) if name == "i32"));
        assert!(layout.element_at_offset(context.i32_type(), 0).is_err());

        let ty = context.struct_type(&[context.i8_type()], false);
        let err = layout.offset_of_element(ty, 1).unwrap_err();
        assert!(matches!(
            err.kind(),
            TargetErrorKind::ElementOutOfRange { index: 1, count: 1 }
        ));
    }

    #[test]
    fn element_at_offset_rejects_empty_struct() {
        let context = Context::new();
        let layout = DataLayout::parse(X86_64_LINUX).unwrap();

        let empty = context.struct_type(&[], false);
        let err = layout.element_at_offset(empty, 0).unwrap_err();
        assert!(matches!(
            err.kind(),
            TargetErrorKind::ElementOutOfRange { index: 0, count: 0 }
        ));

        let pair = context.struct_type(&[context.i32_type(), context.i32_type()], false);
        assert_eq!(layout.element_at_offset(pair, 0).unwrap(), 0);
        assert_eq!(layout.element_at_offset(pair, 4).unwrap(), 1);
    }

    #[test]
    fn clone_is_independent() {
        let layout = DataLayout::parse(BIG_ENDIAN_32).unwrap();
        let copy = layout.clone();
        drop(layout);
        assert_eq!(copy.as_string(), BIG_ENDIAN_32);
    }

    #[test]
    fn module_layout_is_copied() {
        let context = Context::new();
        let mut module = Module::new("layout", &context).unwrap();
        let layout = DataLayout::parse(X86_64_LINUX).unwrap();
        module.set_data_layout(&layout);
        drop(layout);

        let copy = module.data_layout();
        drop(module);
        assert_eq!(copy.as_string(), X86_64_LINUX);
    }

    #[test]
    fn preferred_alignment_of_global_honours_explicit_alignment() {
        let context = Context::new();
        let module = Module::new("globals", &context).unwrap();
        let layout = DataLayout::parse(X86_64_LINUX).unwrap();

        let global = module.add_global(context.i64_type(), "counter").unwrap();
        assert_eq!(layout.preferred_alignment_of_global(global), 8);

        global.set_alignment(32);
        assert_eq!(layout.preferred_alignment_of_global(global), 32);
    }

    #[test]
    fn struct_field_offsets() {
        let context = Context::new();
        let layout = DataLayout::parse(X86_64_LINUX).unwrap();
        let fields = [
            context.i8_type(),
            context.i64_type(),
            context.i16_type(),
            context.i32_type(),
        ];

        let mut table = String::new();
        for packed in [false, true] {
            let ty = context.struct_type(&fields, packed);
            let offsets: Vec<String> = (0..4)
                .map(|i| layout.offset_of_element(ty, i).unwrap().to_string())
                .collect();
            table.push_str(&format!(
                "{ty}: size {} align {} offsets {}\n",
                layout.abi_size(ty),
                layout.abi_alignment(ty),
                offsets.join(",")
            ));
        }

        insta::assert_snapshot!(table, @r"
        { i8, i64, i16, i32 }: size 24 align 8 offsets 0,8,16,20
        <{ i8, i64, i16, i32 }>: size 15 align 1 offsets 0,1,9,11
        ");
    }
}
