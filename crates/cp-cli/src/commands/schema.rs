/*
 *
 *
 *
 *
 * MIT License
 * Copyright (c) 2025. Dwight J. Browne
 * dwight[-at-]dwightjbrowne[-dot-]com
 *
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */

use anyhow::Result;
use clap::Args;
use cp_models::TableSchema;

#[derive(Args, Debug)]
pub struct SchemaArgs {
  /// Print the schema as a JSON field list
  #[arg(long)]
  json: bool,
}

/// Print the destination table schema
pub fn execute(args: SchemaArgs) -> Result<()> {
  let schema = TableSchema::crypto_markets();
  if args.json {
    println!("{}", serde_json::to_string_pretty(&schema)?);
    return Ok(());
  }

  println!("{:<18} {:<10} MODE", "COLUMN", "TYPE");
  for field in &schema.fields {
    let mode = format!("{:?}", field.mode).to_uppercase();
    println!("{:<18} {:<10} {}", field.name, field.field_type.to_string(), mode);
  }
  Ok(())
}
