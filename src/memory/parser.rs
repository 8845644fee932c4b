// ============================================================================
// Statement recognition for the in-memory backend
// ============================================================================
//
// Only the integer-table subset the counter protocol and schema export emit is
// understood: CREATE/DROP TABLE, INSERT ... VALUES, single-table SELECT with an
// optional equality filter and lock, and UPDATE ... SET col = x WHERE col = y.

use crate::core::{Result, SeqError};
use sqlparser::ast as sql_ast;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Literal(i64),
    /// 1-based parameter position
    Param(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: Operand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Wildcard,
    Column { name: String, alias: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemStatement {
    CreateTable {
        table: String,
        columns: Vec<String>,
        if_not_exists: bool,
    },
    DropTable {
        table: String,
        if_exists: bool,
    },
    Insert {
        table: String,
        rows: Vec<Vec<Operand>>,
    },
    Select {
        table: String,
        projection: Vec<Projection>,
        filter: Option<Filter>,
        for_update: bool,
    },
    Update {
        table: String,
        assignments: Vec<(String, Operand)>,
        filter: Option<Filter>,
    },
}

impl MemStatement {
    pub fn returns_rows(&self) -> bool {
        matches!(self, Self::Select { .. })
    }
}

#[derive(Default)]
pub struct StatementParser {
    dialect: GenericDialect,
}

impl StatementParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(&self, sql: &str) -> Result<MemStatement> {
        let mut statements =
            Parser::parse_sql(&self.dialect, sql).map_err(|e| SeqError::Parse(e.to_string()))?;
        if statements.len() != 1 {
            return Err(SeqError::Unsupported(format!(
                "expected exactly one statement, got {}",
                statements.len()
            )));
        }

        let mut params = 0usize;
        match statements.remove(0) {
            sql_ast::Statement::CreateTable(create) => Ok(MemStatement::CreateTable {
                table: create.name.to_string(),
                columns: create.columns.into_iter().map(|c| c.name.value).collect(),
                if_not_exists: create.if_not_exists,
            }),
            sql_ast::Statement::Drop {
                object_type,
                names,
                if_exists,
                ..
            } => {
                if !matches!(object_type, sql_ast::ObjectType::Table) || names.len() != 1 {
                    return Err(SeqError::Unsupported(
                        "only single-table DROP TABLE is supported".into(),
                    ));
                }
                Ok(MemStatement::DropTable {
                    table: names[0].to_string(),
                    if_exists,
                })
            }
            sql_ast::Statement::Insert(insert) => {
                let table = insert.table.to_string();
                let Some(source) = insert.source else {
                    return Err(SeqError::Unsupported("INSERT needs a VALUES clause".into()));
                };
                let sql_ast::SetExpr::Values(values) = *source.body else {
                    return Err(SeqError::Unsupported("only INSERT ... VALUES is supported".into()));
                };
                let rows = values
                    .rows
                    .into_iter()
                    .map(|row| {
                        row.into_iter()
                            .map(|expr| convert_operand(expr, &mut params))
                            .collect::<Result<Vec<_>>>()
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(MemStatement::Insert { table, rows })
            }
            sql_ast::Statement::Query(query) => convert_select(*query, &mut params),
            sql_ast::Statement::Update {
                table,
                assignments,
                selection,
                ..
            } => {
                let table = match table.relation {
                    sql_ast::TableFactor::Table { name, .. } => name.to_string(),
                    _ => {
                        return Err(SeqError::Unsupported(
                            "UPDATE needs a plain table reference".into(),
                        ));
                    }
                };
                let assignments = assignments
                    .into_iter()
                    .map(|assign| {
                        let column = match assign.target {
                            sql_ast::AssignmentTarget::ColumnName(name) => column_name(&name)?,
                            _ => {
                                return Err(SeqError::Unsupported(
                                    "only simple column assignments are supported".into(),
                                ));
                            }
                        };
                        Ok((column, convert_operand(assign.value, &mut params)?))
                    })
                    .collect::<Result<Vec<_>>>()?;
                let filter = selection
                    .map(|expr| convert_filter(expr, &mut params))
                    .transpose()?;
                Ok(MemStatement::Update {
                    table,
                    assignments,
                    filter,
                })
            }
            other => Err(SeqError::Unsupported(format!(
                "statement not supported by the memory backend: {}",
                other
            ))),
        }
    }
}

fn convert_select(query: sql_ast::Query, params: &mut usize) -> Result<MemStatement> {
    let mut for_update = !query.locks.is_empty();
    let sql_ast::SetExpr::Select(select) = *query.body else {
        return Err(SeqError::Unsupported("only plain SELECT is supported".into()));
    };
    let select = *select;

    if select.from.len() != 1 || !select.from[0].joins.is_empty() {
        return Err(SeqError::Unsupported("SELECT must read exactly one table".into()));
    }
    let table = match &select.from[0].relation {
        sql_ast::TableFactor::Table {
            name, with_hints, ..
        } => {
            // Inline hints such as `with (updlock, rowlock)` lock like FOR UPDATE.
            for_update |= !with_hints.is_empty();
            name.to_string()
        }
        _ => {
            return Err(SeqError::Unsupported(
                "SELECT needs a plain table reference".into(),
            ));
        }
    };

    let projection = select
        .projection
        .into_iter()
        .map(|item| match item {
            sql_ast::SelectItem::Wildcard(_) => Ok(Projection::Wildcard),
            sql_ast::SelectItem::UnnamedExpr(expr) => Ok(Projection::Column {
                name: expr_column(&expr)?,
                alias: None,
            }),
            sql_ast::SelectItem::ExprWithAlias { expr, alias } => Ok(Projection::Column {
                name: expr_column(&expr)?,
                alias: Some(alias.value),
            }),
            _ => Err(SeqError::Unsupported("unsupported select item".into())),
        })
        .collect::<Result<Vec<_>>>()?;

    let filter = select
        .selection
        .map(|expr| convert_filter(expr, params))
        .transpose()?;

    Ok(MemStatement::Select {
        table,
        projection,
        filter,
        for_update,
    })
}

fn convert_filter(expr: sql_ast::Expr, params: &mut usize) -> Result<Filter> {
    match expr {
        sql_ast::Expr::Nested(inner) => convert_filter(*inner, params),
        sql_ast::Expr::BinaryOp {
            left,
            op: sql_ast::BinaryOperator::Eq,
            right,
        } => Ok(Filter {
            column: expr_column(&left)?,
            value: convert_operand(*right, params)?,
        }),
        other => Err(SeqError::Unsupported(format!(
            "only `column = value` filters are supported, got {}",
            other
        ))),
    }
}

fn convert_operand(expr: sql_ast::Expr, params: &mut usize) -> Result<Operand> {
    match expr {
        sql_ast::Expr::Nested(inner) => convert_operand(*inner, params),
        sql_ast::Expr::UnaryOp {
            op: sql_ast::UnaryOperator::Minus,
            expr,
        } => match convert_operand(*expr, params)? {
            Operand::Literal(v) => v
                .checked_neg()
                .map(Operand::Literal)
                .ok_or_else(|| SeqError::Parse(format!("cannot negate {}", v))),
            Operand::Param(_) => Err(SeqError::Unsupported("negated parameters".into())),
        },
        sql_ast::Expr::Value(value_with_span) => match value_with_span.value {
            sql_ast::Value::Number(n, _) => n
                .parse::<i64>()
                .map(Operand::Literal)
                .map_err(|_| SeqError::Parse(format!("not an integer literal: {}", n))),
            sql_ast::Value::Placeholder(p) => {
                if p == "?" {
                    *params += 1;
                    Ok(Operand::Param(*params))
                } else if let Some(position) = p.strip_prefix('$') {
                    position
                        .parse::<usize>()
                        .ok()
                        .filter(|pos| *pos >= 1)
                        .map(Operand::Param)
                        .ok_or_else(|| SeqError::Parse(format!("bad placeholder {}", p)))
                } else {
                    Err(SeqError::Unsupported(format!("placeholder style {}", p)))
                }
            }
            other => Err(SeqError::Unsupported(format!(
                "only integer values are supported, got {}",
                other
            ))),
        },
        other => Err(SeqError::Unsupported(format!(
            "unsupported value expression {}",
            other
        ))),
    }
}

fn expr_column(expr: &sql_ast::Expr) -> Result<String> {
    match expr {
        sql_ast::Expr::Identifier(ident) => Ok(ident.value.clone()),
        sql_ast::Expr::CompoundIdentifier(parts) => parts
            .last()
            .map(|ident| ident.value.clone())
            .ok_or_else(|| SeqError::Parse("empty column reference".into())),
        other => Err(SeqError::Unsupported(format!(
            "expected a column reference, got {}",
            other
        ))),
    }
}

fn column_name(name: &sql_ast::ObjectName) -> Result<String> {
    if name.0.len() != 1 {
        return Err(SeqError::Unsupported(
            "qualified column names are not supported".into(),
        ));
    }
    Ok(name.0[0].to_string())
}
