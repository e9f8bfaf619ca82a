#[cfg(test)]
mod tests {
    use crate::compiler::context::{CompileContext, CompilerOptions};
    use crate::compiler::emitter::*;
    use crate::compiler::layout::{assign_offsets, resolve_keys};
    use crate::compiler::types::{parse_key_list, ElementKind, Item, NodeKind, NodeState, TypeId};
    use crate::compiler::{StringTable, Target};

    fn context(keys: &str, st: &StringTable) -> CompileContext {
        CompileContext::new(
            CompilerOptions::default(),
            parse_key_list(keys, st).unwrap(),
            st,
        )
    }

    fn define(
        ctx: &mut CompileContext,
        st: &StringTable,
        kind: NodeKind,
        name: Option<&str>,
        items: &[Item],
    ) -> TypeId {
        let name = name.map(|n| st.insert(n.into()));
        let id = ctx.table.add(kind, name, NodeState::Defining, 1);
        for item in items {
            ctx.table.append_item(id, *item);
        }
        ctx.table.finish(id);
        if let Some(name) = name {
            ctx.registry.insert(name, id);
        }
        id
    }

    fn union_of(ctx: &mut CompileContext, kinds: &[ElementKind]) -> TypeId {
        let union = ctx.table.add(NodeKind::Union, None, NodeState::Defining, 1);
        for el in kinds {
            let m = ctx.table.add(NodeKind::UnionMember, None, NodeState::Defining, 1);
            ctx.table.append_item(m, Item::new(1, *el));
            ctx.table.finish(m);
            ctx.table.add_member(union, m);
        }
        ctx.table.finish(union);
        union
    }

    fn lay_out(ctx: &mut CompileContext, st: &StringTable) {
        resolve_keys(ctx, st).unwrap();
        assign_offsets(ctx, st).unwrap();
    }

    /// `outer { char; struct inner; }` where `inner { long long; }`.
    fn nested(st: &StringTable) -> DescriptorTable {
        let mut ctx = context("outer", st);
        let inner = define(&mut ctx, st, NodeKind::Struct, Some("inner"), &[Item::new(1, ElementKind::Int64)]);
        define(
            &mut ctx,
            st,
            NodeKind::Struct,
            Some("outer"),
            &[
                Item::new(1, ElementKind::Int8),
                Item::new(1, ElementKind::StructLink(inner)),
            ],
        );
        lay_out(&mut ctx, st);
        emit(&mut ctx, st).unwrap()
    }

    /// `msg { int; union { int; double; } body; }`.
    fn with_union(st: &StringTable) -> DescriptorTable {
        let mut ctx = context("msg", st);
        let union = union_of(&mut ctx, &[ElementKind::Int32, ElementKind::Float64]);
        ctx.table.get_mut(union).fragment = Some(st.insert("body".into()));
        define(
            &mut ctx,
            st,
            NodeKind::Struct,
            Some("msg"),
            &[
                Item::new(1, ElementKind::Int32),
                Item::new(1, ElementKind::UnionLink(union)),
            ],
        );
        lay_out(&mut ctx, st);
        emit(&mut ctx, st).unwrap()
    }

    #[test]
    fn cell_packing() {
        let field = Cell::Field {
            count: 3,
            code: 'i',
            last: false,
        };
        assert_eq!(field.pack(), Some(0x300 | 'i' as u64));

        let last = Cell::Field {
            count: 3,
            code: 'i',
            last: true,
        };
        assert_eq!(last.pack(), Some(0x300 | 'I' as u64));

        assert_eq!(Cell::UnionRef { index: 2, align: 4 }.pack(), Some(0x204));
        assert_eq!(Cell::StructRef(17).pack(), Some(17));
        assert_eq!(Cell::Length(24).pack(), Some(24));

        let huge = Cell::Field {
            count: 1 << 56,
            code: 'c',
            last: false,
        };
        assert_eq!(huge.pack(), None);
    }

    #[test]
    fn dependencies_are_written_before_their_users() {
        let st = StringTable::new();
        let table = nested(&st);

        assert_eq!(
            table.cells,
            vec![
                Cell::Length(8),
                Cell::Field {
                    count: 1,
                    code: 'l',
                    last: true
                },
                Cell::Length(16),
                Cell::Field {
                    count: 1,
                    code: 'c',
                    last: false
                },
                Cell::Field {
                    count: 1,
                    code: 's',
                    last: true
                },
                Cell::StructRef(0),
            ]
        );
        assert_eq!(
            table.packed().unwrap(),
            vec![8, 0x100 | 'L' as u64, 16, 0x100 | 'c' as u64, 0x100 | 'S' as u64, 0]
        );
        assert_eq!(table.starts, vec![(0, "inner".to_string()), (2, "outer".to_string())]);
        assert_eq!(
            table.symbols,
            vec![Symbol {
                name: "outer".into(),
                offset: 2,
                kind: SymbolKind::Key
            }]
        );
        assert!(table.jump_slots.is_empty());
    }

    #[test]
    fn unions_export_members_and_a_jump_slot() {
        let st = StringTable::new();
        let table = with_union(&st);

        assert_eq!(table.cells[4], Cell::Length(8));
        assert_eq!(table.cells.last(), Some(&Cell::UnionRef { index: 0, align: 8 }));
        assert_eq!(table.packed().unwrap().last(), Some(&8));

        let symbols: Vec<(&str, u64, SymbolKind)> = table
            .symbols
            .iter()
            .map(|s| (s.name.as_str(), s.offset, s.kind))
            .collect();
        assert_eq!(
            symbols,
            vec![
                ("msg", 5, SymbolKind::Key),
                ("msg_body_0", 0, SymbolKind::UnionMember),
                ("msg_body_1", 2, SymbolKind::UnionMember),
            ]
        );
        assert_eq!(
            table.jump_slots,
            vec![JumpSlot {
                index: 0,
                union: "msg_body".into()
            }]
        );
    }

    #[test]
    fn colliding_constant_names_are_rejected() {
        let st = StringTable::new();
        let mut ctx = context("x, x_0", &st);
        let union = union_of(&mut ctx, &[ElementKind::Int32, ElementKind::Int8]);
        let x = st.insert("x".into());
        ctx.table.get_mut(union).name = Some(x);
        ctx.registry.insert(x, union);
        define(&mut ctx, &st, NodeKind::Struct, Some("x_0"), &[Item::new(1, ElementKind::Int16)]);
        lay_out(&mut ctx, &st);

        let err = emit(&mut ctx, &st).unwrap_err();
        assert_eq!(*err.inner(), EmitError::DuplicateSymbol("x_0".into()));
        assert!(!err.inner().is_internal());
    }

    #[test]
    fn unassigned_node_is_an_internal_error() {
        let st = StringTable::new();
        let mut ctx = context("lonely", &st);
        define(&mut ctx, &st, NodeKind::Struct, Some("lonely"), &[Item::new(1, ElementKind::Int32)]);
        resolve_keys(&mut ctx, &st).unwrap();

        let err = emit(&mut ctx, &st).unwrap_err();
        assert!(matches!(err.inner(), EmitError::Unassigned(_)));
        assert!(err.inner().is_internal());
    }

    #[test]
    fn cells_must_fit_the_target() {
        let table = DescriptorTable {
            target: Target::Bits32,
            cells: vec![Cell::Length(1 << 32)],
            starts: vec![],
            symbols: vec![],
            jump_slots: vec![],
        };
        let err = table.packed().unwrap_err();
        assert!(matches!(err.inner(), EmitError::CellOverflow(_, v) if *v == 1 << 32));

        let table = DescriptorTable {
            target: Target::Bits64,
            ..table
        };
        assert_eq!(table.packed().unwrap(), vec![1 << 32]);
    }

    #[test]
    fn header_marks_every_offset() {
        let st = StringTable::new();
        let table = with_union(&st);
        let names = CHeaderNames::new("net_", "desc_offsets.h");
        let header = write_header(&table, &names);

        assert!(header.contains("#ifndef DESC_OFFSETS_H\n#define DESC_OFFSETS_H\n"));
        assert!(header.contains("#define TYPEDESC_OFFSET_MARK 0x80000000u\n"));
        assert!(header.contains("#define net_msg (TYPEDESC_OFFSET_MARK | 5u)\n"));
        assert!(header.contains("#define net_msg_body_0 (TYPEDESC_OFFSET_MARK | 0u)\n"));
        assert!(header.contains("#define net_msg_body_1 (TYPEDESC_OFFSET_MARK | 2u)\n"));
        assert!(header.contains("typedef int (*net_convert_fn)();\n"));
        assert!(header.contains("extern const unsigned long long net_desc_table[];\n"));
        assert!(header.contains("extern net_convert_fn net_desc_jump[];\n"));
        assert!(header.trim_end().ends_with("#endif /* DESC_OFFSETS_H */"));
    }

    #[test]
    fn table_source_lists_cells_and_converters() {
        let st = StringTable::new();
        let table = nested(&st);
        let names = CHeaderNames::new("", "desc_offsets.h");
        let source = write_table(&table, &names).unwrap();

        assert!(source.contains("#include \"desc_offsets.h\"\n"));
        assert!(source.contains("const unsigned long long desc_table[] = {\n"));
        assert!(source.contains("    /* 0: inner */\n    0x8u, /* length 8 */\n"));
        assert!(source.contains("    0x14cu, /* 1 x int64, last */\n"));
        assert!(source.contains("    /* 2: outer */\n"));
        assert!(source.contains("    0x0u, /* -> 0 */\n"));
        assert!(source.contains("convert_fn desc_jump[] = { 0 };\n"));

        let st = StringTable::new();
        let table = with_union(&st);
        let names = CHeaderNames::new("net_", "desc_offsets.h");
        let source = write_table(&table, &names).unwrap();
        assert!(source.contains("#ifdef TYPEDESC_MESSAGING\nextern int net_convert_msg_body();\n"));
        assert!(source.contains("    net_convert_msg_body, /* 0 */\n"));
        assert!(source.contains("    0x8u, /* jump 0 align 8 */\n"));
    }

    #[test]
    fn converters_register_by_slot_or_union_name() {
        let slots = vec![
            JumpSlot {
                index: 1,
                union: "b".into(),
            },
            JumpSlot {
                index: 0,
                union: "a".into(),
            },
        ];
        let mut registry = ConverterRegistry::new(&slots);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.unresolved(), vec!["a", "b"]);

        registry
            .register_union("b", Box::new(|v: &[u8]| v.first().map(|b| *b as usize)))
            .unwrap();
        assert_eq!(registry.unresolved(), vec!["a"]);
        assert_eq!(registry.get(1).unwrap().active_member(&[2, 0]), Some(2));
        assert!(registry.get(0).is_none());

        registry.register(0, Box::new(|_: &[u8]| -> Option<usize> { None })).unwrap();
        assert!(registry.unresolved().is_empty());
        assert_eq!(registry.get(0).unwrap().active_member(&[]), None);

        let err = registry.register(5, Box::new(|_: &[u8]| -> Option<usize> { None })).unwrap_err();
        assert_eq!(*err.inner(), EmitError::UnknownJumpSlot(5));
        let err = registry
            .register_union("zzz", Box::new(|_: &[u8]| -> Option<usize> { None }))
            .unwrap_err();
        assert_eq!(*err.inner(), EmitError::UnknownUnion("zzz".into()));
    }

    #[test]
    fn json_dump_has_cells_and_packed_values() {
        let st = StringTable::new();
        let table = with_union(&st);
        let json = to_json(&table).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let packed: Vec<u64> = value["packed"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_u64().unwrap())
            .collect();
        assert_eq!(packed, table.packed().unwrap());
        assert_eq!(value["cells"][0]["Length"], 4);
        assert_eq!(value["symbols"][0]["name"], "msg");
        assert_eq!(value["jump_slots"][0]["union"], "msg_body");
        assert_eq!(value["target"], "Bits64");
    }
}
