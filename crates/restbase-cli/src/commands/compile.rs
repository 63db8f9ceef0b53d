use anyhow::Result;
use restbase_query::{PaginationPolicy, parse};

use super::compiler_for;
use crate::cli::{CompileArgs, OutputFormat, StatementKind};
use crate::output::print_compiled;

pub fn compile(args: &CompileArgs, policy: &PaginationPolicy, format: OutputFormat) -> Result<()> {
    let params = parse(&args.query)?.paginate(policy);

    let compiler = compiler_for(&args.table, args.schema.as_deref(), &args.columns)?;

    let compiled = match args.kind {
        StatementKind::Select => compiler.compile(&params)?,
        StatementKind::Count => compiler.compile_count(&params)?,
        StatementKind::Explain => compiler.compile_explain(&params)?,
    };
    tracing::debug!(params = compiled.params.len(), "compiled query");

    print_compiled(&compiled, format);
    Ok(())
}
