/*  This file is part of hps-conditions, the conditions database layer of the HPS experiment software.
    Copyright in each year of 2013-2015 inclusive, and 2026, the HPS Collaboration.
    hps-conditions is free software, distributed under the GNU Affero General Public License as published by
    the Free Software Foundation; see the file LICENSE for license version and details.
    hps-conditions is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
    You should have received a copy of the GNU Affero General Public License along with hps-conditions.  If not, see <http://www.gnu.org/licenses/>
*/

pub mod conditions_object;
pub mod conditions_record;
pub mod config;
pub mod connection;
pub mod converter;
pub mod database;
#[cfg(test)]
pub mod database_test_utils;
pub mod ecal;
pub mod postgresql_database;
pub mod query_builder;
pub mod resource_reader;
pub mod table_meta_data;
pub mod type_registry;
